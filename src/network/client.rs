//! Blocking TCP client

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::protocol::{read_response, write_command, Command, Response, Status};

/// A single connection to a ShardKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect with `timeout` applied to connect, reads and writes
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| KvError::Network(format!("cannot resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| KvError::Network(format!("{} resolved to no addresses", addr)))?;

        let stream = TcpStream::connect_timeout(&socket_addr, timeout)
            .map_err(|e| KvError::Network(format!("cannot connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Get a value by key
    pub fn get(&mut self, key: &str) -> Result<String> {
        self.call(Command::Get { key: key.to_string() })?.text()
    }

    /// Set a key-value pair
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.call(Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }

    /// Values of all keys starting with `prefix`
    pub fn get_prefix(&mut self, prefix: &str) -> Result<Vec<String>> {
        self.call(Command::GetPrefix {
            prefix: prefix.to_string(),
        })?
        .decode_values()
    }

    /// Health check
    pub fn ping(&mut self) -> Result<()> {
        let reply = self.call(Command::Ping)?.text()?;
        if reply != "PONG" {
            return Err(KvError::Protocol(format!("unexpected ping reply {:?}", reply)));
        }
        Ok(())
    }

    /// Send one command and map a non-OK status to an error
    pub fn call(&mut self, command: Command) -> Result<Response> {
        write_command(&mut self.writer, &command)?;
        let response = read_response(&mut self.reader)?;

        match response.status {
            Status::Ok => Ok(response),
            Status::NotFound => Err(KvError::NotFound(response.text()?)),
            Status::Error => Err(KvError::Remote(response.text()?)),
            Status::Unavailable => Err(KvError::Unavailable),
        }
    }
}
