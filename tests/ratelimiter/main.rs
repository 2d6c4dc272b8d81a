// tests/ratelimiter/main.rs

mod config_tests;
