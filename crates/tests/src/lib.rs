pub mod fixtures;

#[cfg(test)]
mod http_tests;
#[cfg(test)]
mod ws_tests;
