//! Tests for argument parsing and configuration file handling
