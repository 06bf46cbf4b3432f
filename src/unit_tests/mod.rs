#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod fitness_tests;
