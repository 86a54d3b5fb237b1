use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::NetError;
use crate::runner::NodeRunner;
use crate::topology::{Interface, NodeKind, Topology};

/// A running emulated network: its topology plus the means to reach its nodes.
pub struct NetworkSession {
    topology: Topology,
    runner: Arc<dyn NodeRunner>,
    provisioned: bool,
    running: AtomicBool,
}

/// Borrowed handle on one node of a running session.
pub struct Node<'a> {
    name: &'a str,
    runner: &'a dyn NodeRunner,
}

impl Node<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn cmd(&self, command: &str) -> Result<String, NetError> {
        self.runner.cmd(self.name, command)
    }

    pub fn popen(&self, command: &str) -> Result<(), NetError> {
        self.runner.popen(self.name, command)
    }
}

impl NetworkSession {
    /// Brings the network up. With `provision` the namespaces, bridges and
    /// shaped links are created first; without it they must already exist.
    pub fn start(
        topology: Topology,
        runner: Arc<dyn NodeRunner>,
        provision: bool,
    ) -> Result<Self, NetError> {
        let session = NetworkSession {
            topology,
            runner,
            provisioned: provision,
            running: AtomicBool::new(true),
        };

        let brought_up = if provision {
            session.provision().and_then(|()| session.configure_routers())
        } else {
            session.configure_routers()
        };

        if let Err(e) = brought_up {
            if provision {
                warn!("network start failed, removing what was created: {e}");
                session.teardown();
            }
            return Err(e);
        }

        info!("--- Network created successfully ---");
        Ok(session)
    }

    fn configure_routers(&self) -> Result<(), NetError> {
        info!("--- Configuring routers ---");
        for router in &self.topology.routers {
            self.runner
                .cmd(&router.name, "sysctl -w net.ipv4.ip_forward=1")?;
        }

        info!("--- Setting up static routes ---");
        for router in &self.topology.routers {
            for route in &router.routes {
                let command = format!("ip route add {} via {} dev {}", route.dest, route.via, route.dev);
                self.runner.cmd(&router.name, &command)?;
            }
        }
        Ok(())
    }

    fn provision(&self) -> Result<(), NetError> {
        let topo = &self.topology;

        info!("--- Adding switches ---");
        for sw in &topo.switches {
            self.runner.root_cmd(&format!("ip link add {sw} type bridge"))?;
            self.runner.root_cmd(&format!("ip link set {sw} up"))?;
        }

        info!("--- Adding hosts ---");
        for host in &topo.hosts {
            self.add_namespace(&host.name)?;
        }

        info!("--- Adding routers ---");
        for router in &topo.routers {
            self.add_namespace(&router.name)?;
        }

        info!("--- Creating links ---");
        for (link, (a, b)) in topo.links.iter().zip(topo.interfaces()) {
            self.runner
                .root_cmd(&format!("ip link add {} type veth peer name {}", a.name, b.name))?;
            for iface in [&a, &b] {
                self.attach(iface)?;
                self.shape(iface, link.bw, &link.delay)?;
            }
        }

        info!("--- Starting network ---");
        for host in &topo.hosts {
            self.runner.root_cmd(&format!(
                "ip -n {} route add default via {}",
                host.name, host.default_route
            ))?;
        }
        Ok(())
    }

    fn add_namespace(&self, name: &str) -> Result<(), NetError> {
        self.runner.root_cmd(&format!("ip netns add {name}"))?;
        self.runner.root_cmd(&format!("ip -n {name} link set lo up"))?;
        Ok(())
    }

    fn attach(&self, iface: &Interface) -> Result<(), NetError> {
        match iface.kind {
            NodeKind::Switch => {
                self.runner
                    .root_cmd(&format!("ip link set {} master {}", iface.name, iface.node))?;
                self.runner.root_cmd(&format!("ip link set {} up", iface.name))?;
            }
            NodeKind::Host | NodeKind::Router => {
                self.runner
                    .root_cmd(&format!("ip link set {} netns {}", iface.name, iface.node))?;
                if let Some(ip) = &iface.ip {
                    self.runner
                        .root_cmd(&format!("ip -n {} addr add {} dev {}", iface.node, ip, iface.name))?;
                }
                self.runner
                    .root_cmd(&format!("ip -n {} link set {} up", iface.node, iface.name))?;
            }
        }
        Ok(())
    }

    fn shape(&self, iface: &Interface, bw: f64, delay: &str) -> Result<(), NetError> {
        let netns = match iface.kind {
            NodeKind::Switch => String::new(),
            _ => format!("-n {} ", iface.node),
        };
        self.runner.root_cmd(&format!(
            "tc {netns}qdisc add dev {} root netem delay {delay} rate {bw}mbit",
            iface.name
        ))?;
        Ok(())
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Looks up a host or router by name.
    pub fn node(&self, name: &str) -> Result<Node<'_>, NetError> {
        if !self.is_running() {
            return Err(NetError::NotRunning);
        }
        let name = self
            .topology
            .hosts
            .iter()
            .map(|h| h.name.as_str())
            .chain(self.topology.routers.iter().map(|r| r.name.as_str()))
            .find(|n| *n == name)
            .ok_or_else(|| NetError::UnknownNode(name.to_string()))?;

        Ok(Node {
            name,
            runner: self.runner.as_ref(),
        })
    }

    /// Hosts of a running session, in topology order.
    pub fn hosts(&self) -> Result<Vec<Node<'_>>, NetError> {
        if !self.is_running() {
            return Err(NetError::NotRunning);
        }
        Ok(self
            .topology
            .hosts
            .iter()
            .map(|h| Node {
                name: h.name.as_str(),
                runner: self.runner.as_ref(),
            })
            .collect())
    }

    /// Collects detached iperf servers that have exited.
    pub fn reap(&self) {
        self.runner.reap();
    }

    /// Stops the network. Detached processes are killed and provisioned
    /// namespaces and bridges are removed; teardown failures are logged and
    /// skipped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("--- Stopping network ---");
        self.runner.shutdown();
        if self.provisioned {
            self.teardown();
        }
    }

    fn teardown(&self) {
        let namespaces = self
            .topology
            .hosts
            .iter()
            .map(|h| &h.name)
            .chain(self.topology.routers.iter().map(|r| &r.name));
        for ns in namespaces {
            if let Err(e) = self.runner.root_cmd(&format!("ip netns del {ns}")) {
                warn!("{e}");
            }
        }
        for sw in &self.topology.switches {
            if let Err(e) = self.runner.root_cmd(&format!("ip link del {sw}")) {
                warn!("{e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<(String, String)>>,
        fail_on: Option<&'static str>,
        shutdowns: Mutex<usize>,
    }

    impl NodeRunner for Recorder {
        fn cmd(&self, node: &str, command: &str) -> Result<String, NetError> {
            self.commands.lock().unwrap().push((node.into(), command.into()));
            if self.fail_on == Some(command) {
                return Err(NetError::Spawn {
                    node: node.into(),
                    command: command.into(),
                    source: std::io::Error::other("exists"),
                });
            }
            Ok(String::new())
        }

        fn popen(&self, node: &str, command: &str) -> Result<(), NetError> {
            self.cmd(node, command).map(|_| ())
        }

        fn root_cmd(&self, command: &str) -> Result<String, NetError> {
            self.cmd("root", command)
        }

        fn shutdown(&self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    fn has(rec: &Recorder, node: &str, command: &str) -> bool {
        rec.commands
            .lock()
            .unwrap()
            .iter()
            .any(|(n, c)| n == node && c == command)
    }

    #[test]
    fn start_configures_forwarding_and_routes() {
        let rec = Arc::new(Recorder::default());
        let _session = NetworkSession::start(Topology::lab(), rec.clone(), false).unwrap();

        for r in ["r1", "r2", "r3", "r4"] {
            assert!(has(&rec, r, "sysctl -w net.ipv4.ip_forward=1"));
        }
        assert!(has(&rec, "r1", "ip route add 11.0.0.0/24 via 200.0.0.2 dev r1-eth1"));
        assert!(has(&rec, "r4", "ip route add 192.168.1.0/24 via 180.1.2.1 dev r4-eth1"));
        assert!(!rec.commands.lock().unwrap().iter().any(|(n, _)| n == "root"));
    }

    #[test]
    fn provision_builds_links() {
        let rec = Arc::new(Recorder::default());
        let _session = NetworkSession::start(Topology::lab(), rec.clone(), true).unwrap();

        assert!(has(&rec, "root", "ip link add sw1 type bridge"));
        assert!(has(&rec, "root", "ip netns add h1"));
        assert!(has(&rec, "root", "ip link add h1-eth0 type veth peer name sw1-eth0"));
        assert!(has(&rec, "root", "ip -n h1 addr add 10.0.0.1/24 dev h1-eth0"));
        assert!(has(&rec, "root", "ip link set sw1-eth0 master sw1"));
        assert!(has(&rec, "root", "tc -n h3 qdisc add dev h3-eth0 root netem delay 0.5ms rate 1mbit"));
        assert!(has(&rec, "root", "ip -n h1 route add default via 10.0.0.254"));
    }

    #[test]
    fn node_lookup() {
        let rec = Arc::new(Recorder::default());
        let session = NetworkSession::start(Topology::lab(), rec, false).unwrap();

        assert_eq!(session.node("h1").unwrap().name(), "h1");
        assert!(matches!(session.node("sw1"), Err(NetError::UnknownNode(_))));
        assert!(matches!(session.node("h9"), Err(NetError::UnknownNode(_))));
        assert_eq!(session.hosts().unwrap().len(), 5);

        session.stop();
        assert!(matches!(session.node("h1"), Err(NetError::NotRunning)));
    }

    #[test]
    fn failed_provisioning_cleans_up() {
        let rec = Arc::new(Recorder {
            fail_on: Some("ip netns add h3"),
            ..Recorder::default()
        });
        let result = NetworkSession::start(Topology::lab(), rec.clone(), true);
        assert!(matches!(result, Err(NetError::Spawn { .. })));

        assert!(has(&rec, "root", "ip netns del h1"));
        assert!(has(&rec, "root", "ip link del sw1"));
        assert!(!has(&rec, "r1", "sysctl -w net.ipv4.ip_forward=1"));
    }

    #[test]
    fn failed_route_after_provisioning_cleans_up() {
        let rec = Arc::new(Recorder {
            fail_on: Some("ip route add 10.0.0.0/24 via 180.1.2.1 dev r4-eth1"),
            ..Recorder::default()
        });
        assert!(NetworkSession::start(Topology::lab(), rec.clone(), true).is_err());
        assert!(has(&rec, "root", "ip netns del h5"));
    }

    #[test]
    fn stop_shuts_down_detached_processes_once() {
        let rec = Arc::new(Recorder::default());
        let session = NetworkSession::start(Topology::lab(), rec.clone(), true).unwrap();

        session.stop();
        session.stop();
        assert_eq!(*rec.shutdowns.lock().unwrap(), 1);
        assert!(has(&rec, "root", "ip netns del r4"));
    }
}
