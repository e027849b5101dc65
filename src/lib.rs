#![deny(missing_docs)]
//! A school administration backend that keeps all of its state as JSON documents on a remote
//! FTP file server.
//!
//! This crate provides the document store itself, the school operations layered on it, and a
//! [`schoolstore-server`] and [`schoolstore-client`] executable that can be used to interact
//! with them. Requests and responses are exchanged between client and server as JSON over TCP.
//!
//! ## Documents
//! Every piece of state is one whole JSON document addressed by a remote path:
//!
//! - `{base}/{class}.json`: a class roster, mapping student id to student record
//! - `{base}/fees.json`: the fee breakdown of every class
//! - `{base}/invoice_records.json`: the invoice ledger and the next invoice number
//! - `{notices}/teachers.json`: the teachers' notices feed
//! - `{services}/timetable.json`: the current timetable
//!
//! A missing document is always treated the same as an empty one.
//!
//! ## DocStore
//! [`DocStore`] opens a fresh session through a [`Connector`] for every operation and exposes
//! read, write, exists, ensure-directory, list and remove on whole documents. Its `mutate`
//! helpers implement the read-modify-write cycle every school operation uses: read the document
//! (or its default), transform it in memory, upload the result. A failed transform writes
//! nothing.
//!
//! There is no cross-document atomicity and no compare-and-swap on the remote side. Mutations of
//! the same path made through one process are serialized by a per-path lock; mutations from
//! separate processes can still overwrite each other, and the last upload wins.
//!
//! ## School
//! [`School`] holds the operations for classes, students, fees, invoices, notices, timetables,
//! section transfers and marks uploads, and maintains the per-document invariants, e.g.
//! `feesremaining = totalfees - concession - feespaid` on every student mutation.
//!
//! ## Client / Server
//! [`SchoolServer`] listens on a TCP socket and serves each connection on a [`ThreadPool`].
//! Every [`Response`] carries a `status` of `success` or `error`, and errors carry an http-like
//! status code.
//!
//! [`schoolstore-server`]: ./schoolstore-server.rs
//! [`schoolstore-client`]: ./schoolstore-client.rs
//! [`ThreadPool`]: ./thread_pool/trait.ThreadPool.html

pub use client::SchoolClient;
pub use command::{Request, Response};
pub use config::StoreConfig;
pub use error::{Result, SchoolError};
pub use school::School;
pub use server::SchoolServer;
pub use store::{Connector, DocStore, FtpConnector, Session, SledConnector};

pub mod audit;
mod client;
mod command;
pub mod config;
pub mod documents;
mod error;
pub mod marks;
pub mod receipt;
pub mod school;
mod server;
pub mod store;
pub mod thread_pool;
