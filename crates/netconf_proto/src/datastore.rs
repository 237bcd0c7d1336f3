use std::fmt;
use std::str::FromStr;

/// Configuration and state datastores a NETCONF server can expose
/// (RFC 6241 section 5, RFC 8342 section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
    Intended,
    Operational,
}

impl Datastore {
    pub const ALL: [Datastore; 5] = [
        Datastore::Running,
        Datastore::Candidate,
        Datastore::Startup,
        Datastore::Intended,
        Datastore::Operational,
    ];

    pub fn xml_name(self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
            Datastore::Intended => "intended",
            Datastore::Operational => "operational",
        }
    }

    /// The empty element used in `<source>`/`<target>` wrappers.
    pub fn xml_element(self) -> String {
        format!("<{}/>", self.xml_name())
    }

    pub fn from_xml_name(name: &str) -> Result<Datastore, String> {
        name.parse()
    }
}

impl FromStr for Datastore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(Datastore::Running),
            "candidate" => Ok(Datastore::Candidate),
            "startup" => Ok(Datastore::Startup),
            "intended" => Ok(Datastore::Intended),
            "operational" => Ok(Datastore::Operational),
            other => Err(format!("unknown datastore '{}'", other)),
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xml_name())
    }
}
