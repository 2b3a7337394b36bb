#![allow(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod logic;

extern crate capstone;
extern crate libc;
extern crate log;
extern crate memchr;
extern crate regex;
extern crate serde;
extern crate serde_json;
