//! Redcode assembler and MARS simulator for Core War.
//!
//! Source text goes through [`preprocess`] (comments, `EQU`, `FOR`/`ROF`)
//! and [`assembler`] to become a [`warrior::Warrior`]. Warriors then fight
//! in a [`scheduler::Match`], several rounds of which make a
//! [`battle::Battle`]; [`tournament`] runs battles between every pair.

pub mod assembler;
pub mod battle;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod expr;
pub mod lexer;
pub mod preprocess;
pub mod pspace;
pub mod redcode;
pub mod scheduler;
pub mod tournament;
pub mod warrior;
