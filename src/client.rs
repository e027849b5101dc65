use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::{Deserializer, Value};

use crate::command::{Request, Response};
use crate::{Result, SchoolError};

/// `SchoolClient` contains the functionality for communication with a [`SchoolServer`]
///
/// [`SchoolServer`]: ./struct.SchoolServer.html
pub struct SchoolClient {
    reader: Deserializer<IoRead<BufReader<TcpStream>>>,
    writer: BufWriter<TcpStream>,
}

impl SchoolClient {
    /// creates a client and establishes a socket connection to the server at the given `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let tcp_reader = TcpStream::connect(addr)?;
        let tcp_writer = tcp_reader.try_clone()?;

        Ok(SchoolClient {
            reader: Deserializer::from_reader(BufReader::new(tcp_reader)),
            writer: BufWriter::new(tcp_writer),
        })
    }

    /// sends `req` and waits for the server's [`Response`]
    pub fn send(&mut self, req: &Request) -> Result<Response> {
        serde_json::to_writer(&mut self.writer, req)?;
        self.writer.flush()?;
        Ok(Response::deserialize(&mut self.reader)?)
    }

    /// sends `req` and returns the payload of a successful response
    /// # Errors
    /// `SchoolError::Protocol` carrying the server's code and detail if the server reported an
    /// error
    pub fn call(&mut self, req: &Request) -> Result<Value> {
        match self.send(req)? {
            Response::Success { data } => Ok(data),
            Response::Error { code, detail } => Err(SchoolError::Protocol { code, detail }), // re-throwing error here
        }
    }
}
