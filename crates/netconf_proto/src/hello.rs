//! The `<hello>` exchange (RFC 6241 section 8.1) and the capability set it
//! carries.

use crate::frame::Framing;
use crate::{BASE_1_0, BASE_1_1, NETCONF_NS};
use quick_xml::se::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered set of capability URIs advertised in a hello.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(rename = "capability", default)]
    uris: Vec<String>,
}

impl Capabilities {
    pub fn new(uris: Vec<String>) -> Capabilities {
        Capabilities { uris }
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.uris.iter().any(|cap| cap == uri)
    }

    pub fn supports_base_11(&self) -> bool {
        self.contains(BASE_1_1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.uris.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// Base protocol version negotiated from the two advertisement sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseVersion {
    V1_0,
    V1_1,
}

impl BaseVersion {
    pub fn negotiate(client: &Capabilities, server: &Capabilities) -> BaseVersion {
        if client.supports_base_11() && server.supports_base_11() {
            BaseVersion::V1_1
        } else {
            BaseVersion::V1_0
        }
    }

    pub fn framing(self) -> Framing {
        match self {
            BaseVersion::V1_0 => Framing::Eom,
            BaseVersion::V1_1 => Framing::Chunked,
        }
    }
}

impl fmt::Display for BaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseVersion::V1_0 => f.write_str("1.0"),
            BaseVersion::V1_1 => f.write_str("1.1"),
        }
    }
}

/// A `<hello>` document. Client hellos omit the session-id; server hellos
/// carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "hello")]
pub struct Hello {
    #[serde(rename = "@xmlns", default = "netconf_ns")]
    xmlns: String,
    capabilities: Capabilities,
    #[serde(rename = "session-id", default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

fn netconf_ns() -> String {
    NETCONF_NS.to_string()
}

impl Hello {
    /// The client-side advertisement. Base 1.0 and 1.1 are always included;
    /// extra capability URIs from configuration are appended in order.
    pub fn client<I>(extra: I) -> Hello
    where
        I: IntoIterator<Item = String>,
    {
        let mut uris = vec![BASE_1_0.to_string(), BASE_1_1.to_string()];
        for cap in extra {
            if !uris.contains(&cap) {
                uris.push(cap);
            }
        }
        Hello {
            xmlns: netconf_ns(),
            capabilities: Capabilities::new(uris),
            session_id: None,
        }
    }

    /// Parses a server hello. Capability URIs are whitespace-trimmed because
    /// devices routinely pretty-print them on their own lines.
    pub fn parse(document: &str) -> Result<Hello, quick_xml::DeError> {
        let mut hello: Hello = quick_xml::de::from_str(document)?;
        for uri in &mut hello.capabilities.uris {
            let trimmed = uri.trim();
            if trimmed.len() != uri.len() {
                *uri = trimmed.to_string();
            }
        }
        if let Some(id) = &mut hello.session_id {
            *id = id.trim().to_string();
        }
        Ok(hello)
    }

    pub fn to_xml(&self) -> String {
        let mut buffer = String::with_capacity(256);
        let ser = Serializer::new(&mut buffer);
        self.serialize(ser).expect("hello serialization");
        buffer
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn into_capabilities(self) -> Capabilities {
        self.capabilities
    }
}
