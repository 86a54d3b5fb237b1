//! Declarative description of the emulated lab network.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub name: String,
    /// Address with prefix length, e.g. `10.0.0.1/24`.
    pub ip: String,
    pub default_route: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    pub dest: String,
    pub via: String,
    pub dev: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSpec {
    pub name: String,
    pub ip: String,
    pub routes: Vec<StaticRoute>,
}

/// One side of a link. `intf`/`ip` override the generated interface name and
/// the node's primary address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub node: String,
    pub intf: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkSpec {
    pub a: Endpoint,
    pub b: Endpoint,
    /// Mbit/s
    pub bw: f64,
    pub delay: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Host,
    Router,
    Switch,
}

/// A link endpoint with its interface name and address resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub node: String,
    pub kind: NodeKind,
    pub name: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub switches: Vec<String>,
    pub hosts: Vec<HostSpec>,
    pub routers: Vec<RouterSpec>,
    pub links: Vec<LinkSpec>,
}

fn end(node: &str) -> Endpoint {
    Endpoint {
        node: node.to_string(),
        ..Endpoint::default()
    }
}

fn named_end(node: &str, intf: &str, ip: &str) -> Endpoint {
    Endpoint {
        node: node.to_string(),
        intf: Some(intf.to_string()),
        ip: Some(ip.to_string()),
    }
}

fn route(dest: &str, via: &str, dev: &str) -> StaticRoute {
    StaticRoute {
        dest: dest.to_string(),
        via: via.to_string(),
        dev: dev.to_string(),
    }
}

impl Topology {
    pub fn add_switch(&mut self, name: &str) -> &mut Self {
        self.switches.push(name.to_string());
        self
    }

    pub fn add_host(&mut self, name: &str, ip: &str, default_route: &str) -> &mut Self {
        self.hosts.push(HostSpec {
            name: name.to_string(),
            ip: ip.to_string(),
            default_route: default_route.to_string(),
        });
        self
    }

    pub fn add_router(&mut self, name: &str, ip: &str, routes: Vec<StaticRoute>) -> &mut Self {
        self.routers.push(RouterSpec {
            name: name.to_string(),
            ip: ip.to_string(),
            routes,
        });
        self
    }

    pub fn add_link(&mut self, a: Endpoint, b: Endpoint, bw: f64, delay: &str) -> &mut Self {
        self.links.push(LinkSpec {
            a,
            b,
            bw,
            delay: delay.to_string(),
        });
        self
    }

    /// The five-host, four-router lab the web UI drives.
    pub fn lab() -> Self {
        let mut topo = Topology::default();

        for sw in ["sw1", "sw3", "sw4", "sw5"] {
            topo.add_switch(sw);
        }

        topo.add_host("h1", "10.0.0.1/24", "10.0.0.254")
            .add_host("h2", "10.0.0.2/24", "10.0.0.254")
            .add_host("h3", "11.0.0.1/24", "11.0.0.254")
            .add_host("h4", "192.168.1.1/24", "192.168.1.254")
            .add_host("h5", "10.8.1.1/24", "10.8.1.254");

        topo.add_router(
            "r1",
            "10.0.0.254/24",
            vec![
                route("11.0.0.0/24", "200.0.0.2", "r1-eth1"),
                route("192.168.1.0/24", "170.0.0.2", "r1-eth2"),
                route("10.8.1.0/24", "200.0.0.2", "r1-eth1"),
            ],
        )
        .add_router(
            "r2",
            "11.0.0.254/24",
            vec![
                route("10.0.0.0/24", "200.0.0.1", "r2-eth1"),
                route("192.168.1.0/24", "180.1.2.2", "r2-eth2"),
                route("10.8.1.0/24", "180.1.2.2", "r2-eth2"),
            ],
        )
        .add_router(
            "r3",
            "192.168.1.254/24",
            vec![
                route("10.0.0.0/24", "170.0.0.1", "r3-eth1"),
                route("11.0.0.0/24", "170.0.0.1", "r3-eth1"),
                route("10.8.1.0/24", "170.0.0.1", "r3-eth1"),
            ],
        )
        .add_router(
            "r4",
            "10.8.1.254/24",
            vec![
                route("10.0.0.0/24", "180.1.2.1", "r4-eth1"),
                route("11.0.0.0/24", "180.1.2.1", "r4-eth1"),
                route("192.168.1.0/24", "180.1.2.1", "r4-eth1"),
            ],
        );

        topo.add_link(end("h1"), end("sw1"), 100.0, "0.05ms")
            .add_link(end("h2"), end("sw1"), 100.0, "0.05ms")
            .add_link(end("h3"), end("sw5"), 1.0, "0.5ms")
            .add_link(end("h4"), end("sw3"), 100.0, "0.05ms")
            .add_link(end("h5"), end("sw4"), 100.0, "0.05ms");

        topo.add_link(end("sw1"), end("r1"), 100.0, "0.05ms")
            .add_link(end("sw5"), end("r2"), 20.0, "2ms")
            .add_link(end("sw3"), end("r3"), 1.0, "2ms")
            .add_link(end("sw4"), end("r4"), 1.0, "2ms");

        topo.add_link(
            named_end("r1", "r1-eth1", "200.0.0.1/30"),
            named_end("r2", "r2-eth1", "200.0.0.2/30"),
            1.0,
            "2ms",
        )
        .add_link(
            named_end("r1", "r1-eth2", "170.0.0.1/30"),
            named_end("r3", "r3-eth1", "170.0.0.2/30"),
            5.0,
            "2ms",
        )
        .add_link(
            named_end("r2", "r2-eth2", "180.1.2.1/30"),
            named_end("r4", "r4-eth1", "180.1.2.2/30"),
            20.0,
            "2ms",
        );

        topo
    }

    pub fn kind_of(&self, node: &str) -> Option<NodeKind> {
        if self.hosts.iter().any(|h| h.name == node) {
            Some(NodeKind::Host)
        } else if self.routers.iter().any(|r| r.name == node) {
            Some(NodeKind::Router)
        } else if self.switches.iter().any(|s| s == node) {
            Some(NodeKind::Switch)
        } else {
            None
        }
    }

    fn primary_ip(&self, node: &str) -> Option<&str> {
        self.hosts
            .iter()
            .find(|h| h.name == node)
            .map(|h| h.ip.as_str())
            .or_else(|| {
                self.routers
                    .iter()
                    .find(|r| r.name == node)
                    .map(|r| r.ip.as_str())
            })
    }

    /// Resolves both ends of every link, in link order.
    ///
    /// Interfaces are numbered `<node>-eth<n>` per node in the order the node
    /// appears in links. A node's primary address lands on its `eth0`.
    pub fn interfaces(&self) -> Vec<(Interface, Interface)> {
        let mut next: HashMap<String, usize> = HashMap::new();

        let mut resolve = |ep: &Endpoint| {
            let n = next.entry(ep.node.clone()).or_insert(0);
            let index = *n;
            *n += 1;

            let kind = self.kind_of(&ep.node).unwrap_or(NodeKind::Host);
            let name = ep
                .intf
                .clone()
                .unwrap_or_else(|| format!("{}-eth{}", ep.node, index));
            let ip = match (&ep.ip, kind) {
                (Some(ip), _) => Some(ip.clone()),
                (None, NodeKind::Switch) => None,
                (None, _) if index == 0 => self.primary_ip(&ep.node).map(str::to_string),
                (None, _) => None,
            };

            Interface {
                node: ep.node.clone(),
                kind,
                name,
                ip,
            }
        };

        self.links
            .iter()
            .map(|link| (resolve(&link.a), resolve(&link.b)))
            .collect()
    }

    /// Host name to bare address (prefix length stripped).
    pub fn host_ips(&self) -> BTreeMap<String, String> {
        self.hosts
            .iter()
            .map(|h| {
                let addr = h.ip.split('/').next().unwrap_or(&h.ip);
                (h.name.clone(), addr.to_string())
            })
            .collect()
    }
}
