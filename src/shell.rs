//! Interactive Shell
//!
//! Line-oriented command loop over a [`ReplicationEngine`]. Every command
//! runs to completion, and its result is printed, before the next line is
//! read.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::cluster::NodeId;
use crate::config::StoreConfig;
use crate::engine::ReplicationEngine;
use crate::error::Error;
use crate::health::{HealthReport, RepairStatus};
use crate::storage::BlobStore;

const HELP: &str = "Commands: upload <file>, download <file>, delete <file>, list, \
fail <id>, recover <id>, nodes, help, exit";

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(String),
    Download(String),
    Delete(String),
    List,
    Fail(NodeId),
    Recover(NodeId),
    Nodes,
    Help,
    Exit,
}

/// Shell input errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Error: Invalid node ID {0}.")]
    InvalidNodeId(String),

    #[error("Invalid command. Type 'help' for usage.")]
    Unknown(String),
}

impl Command {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "upload" => file_arg(arg, "upload <filename>").map(Command::Upload),
            "download" => file_arg(arg, "download <filename>").map(Command::Download),
            "delete" => file_arg(arg, "delete <filename>").map(Command::Delete),
            "list" => Ok(Command::List),
            "fail" => node_arg(arg, "fail <node_id>").map(Command::Fail),
            "recover" => node_arg(arg, "recover <node_id>").map(Command::Recover),
            "nodes" => Ok(Command::Nodes),
            "help" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn file_arg(arg: &str, usage: &'static str) -> Result<String, ParseError> {
    if arg.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(arg.to_string())
    }
}

fn node_arg(arg: &str, usage: &'static str) -> Result<NodeId, ParseError> {
    let token = arg.split_whitespace().next().ok_or(ParseError::Usage(usage))?;
    token
        .parse()
        .map_err(|_| ParseError::InvalidNodeId(token.to_string()))
}

/// Interactive command loop
pub struct Shell<S: BlobStore> {
    engine: ReplicationEngine<S>,
    config: StoreConfig,
    /// Directory upload sources are read from and downloads written to
    work_dir: PathBuf,
}

impl<S: BlobStore> Shell<S> {
    pub fn new(engine: ReplicationEngine<S>, config: StoreConfig, work_dir: PathBuf) -> Self {
        Self {
            engine,
            config,
            work_dir,
        }
    }

    pub fn engine(&self) -> &ReplicationEngine<S> {
        &self.engine
    }

    /// Read commands until `exit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        writeln!(out, "\n=== WOLFSTORE REPLICATED OBJECT STORE ===")?;
        writeln!(out, "{}\n", HELP)?;

        let mut lines = input.lines();
        loop {
            write!(out, "wolfstore> ")?;
            out.flush()?;

            let line = match lines.next() {
                Some(line) => line?,
                None => break,
            };

            match Command::parse(&line) {
                Ok(command) => {
                    if !self.execute(command, out)? {
                        break;
                    }
                }
                Err(ParseError::Empty) => continue,
                Err(e) => writeln!(out, "{}", e)?,
            }
        }

        writeln!(out)?;
        Ok(())
    }

    /// Execute one command. Returns false when the shell should stop.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<bool> {
        match command {
            Command::Upload(name) => {
                let source = self.work_dir.join(&name);
                match self.engine.upload(&name, &source) {
                    Ok(replicas) => writeln!(
                        out,
                        "[UPLOAD SUCCESS] File replicated to nodes: {}\n",
                        replicas
                    )?,
                    Err(e) => print_error(&e, out)?,
                }
            }
            Command::Download(name) => {
                let destination = self.work_dir.join(self.config.download_path(&name));
                match self.engine.download(&name, &destination) {
                    Ok(node) => writeln!(
                        out,
                        "[DOWNLOAD SUCCESS] File downloaded from Node {}",
                        node
                    )?,
                    Err(e) => print_error(&e, out)?,
                }
            }
            Command::Delete(name) => match self.engine.delete(&name) {
                Ok(_) => writeln!(out, "[DELETE SUCCESS] File removed from store.\n")?,
                Err(e) => print_error(&e, out)?,
            },
            Command::List => {
                let files = self.engine.list();
                if files.is_empty() {
                    writeln!(out, "(Empty) No files stored.\n")?;
                } else {
                    writeln!(out, "\nFILES IN STORE:")?;
                    for record in files {
                        writeln!(out, " - {} → Nodes: {}", record.filename, record.replicas)?;
                    }
                    writeln!(out)?;
                }
            }
            Command::Fail(id) => match self.engine.fail_node(id) {
                Ok(report) => {
                    writeln!(out, "[NODE FAILED] Node {} is inactive.", id)?;
                    print_report(&report, self.engine.factor(), out)?;
                    writeln!(out)?;
                }
                Err(e) => print_error(&e, out)?,
            },
            Command::Recover(id) => match self.engine.recover_node(id) {
                Ok(report) => {
                    writeln!(out, "[NODE RECOVERED] Node {} is active.", id)?;
                    print_report(&report, self.engine.factor(), out)?;
                    writeln!(out)?;
                }
                Err(e) => print_error(&e, out)?,
            },
            Command::Nodes => {
                writeln!(out, "\nNODE STATUS:")?;
                for node in self.engine.nodes() {
                    writeln!(out, "Node {}: {}", node.id, node.status)?;
                }
                let summary = self.engine.registry().summary();
                writeln!(
                    out,
                    "({} of {} active)\n",
                    summary.active_nodes, summary.total_nodes
                )?;
            }
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Exit => return Ok(false),
        }

        Ok(true)
    }
}

fn print_error<W: Write>(err: &Error, out: &mut W) -> io::Result<()> {
    writeln!(out, "Error: {}", err)?;
    if err.is_retryable() {
        writeln!(out, "(May succeed once the affected nodes are recovered.)")?;
    }
    Ok(())
}

fn print_report<W: Write>(report: &HealthReport, factor: usize, out: &mut W) -> io::Result<()> {
    for file in &report.at_risk {
        writeln!(
            out,
            "WARNING: File '{}' has only {} active replicas! Data loss risk!",
            file.filename, file.active_replicas
        )?;

        if let Some(repair) = report.repairs.iter().find(|r| r.filename == file.filename) {
            for node in &repair.restored {
                writeln!(
                    out,
                    "RE-REPLICATED: File '{}' restored to Node {}.",
                    repair.filename, node
                )?;
            }
            for node in &repair.added {
                writeln!(
                    out,
                    "RE-REPLICATED: File '{}' added to Node {}.",
                    repair.filename, node
                )?;
            }
            if !repair.made_progress() || repair.status != RepairStatus::Repaired {
                writeln!(
                    out,
                    "Repair of '{}': {} ({}/{} replicas)",
                    repair.filename, repair.status, repair.replica_count, factor
                )?;
            }
        }

        if let Some(failure) = report.failures.iter().find(|f| f.filename == file.filename) {
            writeln!(
                out,
                "Error during re-replication of '{}': {}",
                failure.filename, failure.reason
            )?;
        }
    }
    Ok(())
}
