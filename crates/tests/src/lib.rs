pub mod fixtures;

#[cfg(test)]
mod robotics_ws_tests;
#[cfg(test)]
mod sweeper_tests;
