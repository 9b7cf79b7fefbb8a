//! Mount Google Drive folders as local filesystems over FUSE.
//!
//! The bridge has four load-bearing pieces: the node model mapping Drive
//! objects to stable inode numbers ([`node`], [`inode`]), a two-tier
//! metadata cache ([`cache`] plus the per-directory maps), whole-file
//! content buffering ([`fs`]), and the mount manager ([`mount`]). The
//! [`remote`] trait keeps the core testable without a network.

pub mod cache;
pub mod config;
pub mod entry;
pub mod fs;
pub mod fuse;
pub mod inode;
pub mod mount;
pub mod node;
pub mod remote;
