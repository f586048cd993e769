//! Cluster bootstrap for the `xrt` backend.
//!
//! A cluster is a set of named jobs, each an ordered list of task servers.
//! [`XrtLocalService`] turns this process into one of those tasks: it
//! validates the topology, serializes it into a [`ClusterSpec`], describes
//! the node with a [`ServerDef`] and binds the task's address. After
//! [`start`](XrtLocalService::start) the node accepts peer connections on a
//! detached thread until the process exits.
//!
//! The wire protocol between peers is not implemented here. A started node
//! answers every connection with its target line (`/job:<job>/task:<index>`)
//! and closes it, which is enough for peers to check reachability with
//! [`probe`].
//!
//! # Example
//! ```
//! use std::collections::HashMap;
//! use xrt_runtime::xrt::{probe, Server, XrtLocalService};
//!
//! let mut jobs = HashMap::new();
//! jobs.insert("worker".to_owned(), vec![Server::new("127.0.0.1", 0)]);
//! let service = XrtLocalService::new(&jobs, "worker", 0).unwrap();
//! service.start().unwrap();
//! let target = probe(&service.local_addr().to_string()).unwrap();
//! assert_eq!(target, "/job:worker/task:0");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How long [`probe`] waits on a peer.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One task server of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `"host:port"`, with IPv6 literals in brackets (`"[::1]:8470"`).
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Job name to the ordered servers of its tasks.
pub type JobMap = HashMap<String, Vec<Server>>;

/// Serialized topology: job name to task index to `"host:port"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSpec {
    jobs: BTreeMap<String, BTreeMap<usize, String>>,
}

impl ClusterSpec {
    #[must_use]
    pub fn from_jobs(jobs: &JobMap) -> Self {
        let jobs = jobs
            .iter()
            .map(|(name, servers)| {
                let tasks = servers.iter().map(Server::address).enumerate().collect();
                (name.clone(), tasks)
            })
            .collect();
        Self { jobs }
    }

    pub fn jobs(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Number of tasks of `job` (`0` for unknown jobs).
    #[must_use]
    pub fn num_tasks(&self, job: &str) -> usize {
        self.jobs.get(job).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn task_address(&self, job: &str, task_index: usize) -> Option<&str> {
        self.jobs.get(job)?.get(&task_index).map(String::as_str)
    }
}

/// Everything needed to build the server of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDef {
    pub cluster: ClusterSpec,
    pub job_name: String,
    pub task_index: usize,
    pub protocol: String,
}

impl ServerDef {
    pub const PROTOCOL: &'static str = "grpc";

    /// `/job:<job>/task:<index>`, the name peers use for this task.
    #[must_use]
    pub fn target(&self) -> String {
        format!("/job:{}/task:{}", self.job_name, self.task_index)
    }

    /// The `"host:port"` of this task.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.cluster.task_address(&self.job_name, self.task_index)
    }
}

/// Lifecycle of a local service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Constructed,
    Started,
}

/// The cluster node of this process.
///
/// There is no way to stop a started node. Dropping the service does not
/// touch the server: the accept thread owns the socket and keeps serving
/// until the process exits.
pub struct XrtLocalService {
    server_def: ServerDef,
    local_addr: SocketAddr,
    /// Taken by `start`.
    listener: Mutex<Option<TcpListener>>,
}

impl XrtLocalService {
    /// Validates the topology and binds the address of task `task_index` of
    /// `job_name`.
    ///
    /// # Errors
    /// [`Error::Configuration`] if `job_name` is not in `jobs`, has no
    /// servers, or has no task `task_index`; [`Error::Io`] if the address
    /// cannot be resolved or bound.
    pub fn new(jobs: &JobMap, job_name: &str, task_index: usize) -> Result<Self> {
        let num_tasks = jobs.get(job_name).map_or(0, Vec::len);
        if num_tasks == 0 {
            return Err(Error::Configuration(format!(
                "job `{job_name}` has no servers in the cluster"
            )));
        }
        if task_index >= num_tasks {
            return Err(Error::Configuration(format!(
                "task index {task_index} out of range for job `{job_name}` with {num_tasks} tasks"
            )));
        }

        let server_def = ServerDef {
            cluster: ClusterSpec::from_jobs(jobs),
            job_name: job_name.to_owned(),
            task_index,
            protocol: ServerDef::PROTOCOL.to_owned(),
        };
        let address = server_def.address().unwrap_or_default().to_owned();
        let listener = TcpListener::bind(address.as_str())?;
        let local_addr = listener.local_addr()?;
        info!(target_name = %server_def.target(), %address, %local_addr, "bound local service");

        Ok(Self {
            server_def,
            local_addr,
            listener: Mutex::new(Some(listener)),
        })
    }

    #[must_use]
    pub fn server_def(&self) -> &ServerDef {
        &self.server_def
    }

    /// The bound address (differs from the configured one for port `0`).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn state(&self) -> ServiceState {
        if self.listener.lock().is_some() {
            ServiceState::Constructed
        } else {
            ServiceState::Started
        }
    }

    /// Starts accepting peers on a detached thread.
    ///
    /// # Errors
    /// [`Error::AlreadyStarted`] on a second call, [`Error::Io`] if the
    /// thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.listener.lock();
        let Some(listener) = slot.take() else {
            return Err(Error::AlreadyStarted(self.server_def.target()));
        };
        let target = self.server_def.target();
        let name = format!(
            "xrt-{}-{}",
            self.server_def.job_name, self.server_def.task_index
        );
        // Detached: the handle is dropped and the thread owns the socket.
        thread::Builder::new().name(name).spawn({
            let target = target.clone();
            move || serve(&listener, &target)
        })?;
        info!(target_name = %target, local_addr = %self.local_addr, "started local service");
        Ok(())
    }
}

impl fmt::Debug for XrtLocalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XrtLocalService")
            .field("server_def", &self.server_def)
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

fn serve(listener: &TcpListener, target: &str) {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let peer = stream.peer_addr().ok();
                if let Err(err) = writeln!(stream, "{target}") {
                    warn!(target_name = target, ?peer, %err, "failed to answer peer");
                } else {
                    debug!(target_name = target, ?peer, "answered peer");
                }
            }
            Err(err) => warn!(target_name = target, %err, "failed to accept peer connection"),
        }
    }
}

/// Connects to a task at `address` and returns the target line it answers
/// with.
///
/// # Errors
/// [`Error::Io`] if the task is unreachable or does not answer within
/// [`PROBE_TIMEOUT`].
pub fn probe(address: &str) -> Result<String> {
    let result = (|| -> std::io::Result<String> {
        let addr = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
        let stream = TcpStream::connect_timeout(&addr, PROBE_TIMEOUT)?;
        stream.set_read_timeout(Some(PROBE_TIMEOUT))?;
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line)?;
        Ok(line.trim_end().to_owned())
    })();
    result.map_err(|err| {
        warn!(address, %err, "failed to reach peer");
        err.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> JobMap {
        let mut jobs = JobMap::new();
        jobs.insert(
            "worker".to_owned(),
            vec![Server::new("127.0.0.1", 0), Server::new("127.0.0.1", 0)],
        );
        jobs.insert("ps".to_owned(), vec![Server::new("10.0.0.1", 8470)]);
        jobs
    }

    #[test]
    fn cluster_spec_keeps_task_order() {
        let spec = ClusterSpec::from_jobs(&jobs());
        assert_eq!(spec.jobs().collect::<Vec<_>>(), vec!["ps", "worker"]);
        assert_eq!(spec.num_tasks("worker"), 2);
        assert_eq!(spec.task_address("ps", 0), Some("10.0.0.1:8470"));
        assert_eq!(spec.task_address("ps", 1), None);
        assert_eq!(spec.num_tasks("chief"), 0);
    }

    #[test]
    fn server_address_brackets_ipv6() {
        assert_eq!(Server::new("10.0.0.1", 8470).address(), "10.0.0.1:8470");
        assert_eq!(Server::new("localhost", 1).address(), "localhost:1");
        let v6 = Server::new("::1", 8470);
        assert_eq!(v6.address(), "[::1]:8470");
        assert!(v6.address().parse::<SocketAddr>().is_ok());
    }

    #[test]
    fn server_def_target() {
        let service = XrtLocalService::new(&jobs(), "worker", 1).unwrap();
        let def = service.server_def();
        assert_eq!(def.protocol, "grpc");
        assert_eq!(def.target(), "/job:worker/task:1");
        assert_eq!(service.state(), ServiceState::Constructed);
    }

    #[test]
    fn rejects_bad_topology() {
        assert!(matches!(
            XrtLocalService::new(&jobs(), "chief", 0),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            XrtLocalService::new(&jobs(), "worker", 2),
            Err(Error::Configuration(_))
        ));
        let mut empty = JobMap::new();
        empty.insert("worker".to_owned(), Vec::new());
        assert!(matches!(
            XrtLocalService::new(&empty, "worker", 0),
            Err(Error::Configuration(_))
        ));
    }
}
