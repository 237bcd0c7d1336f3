//! High-level NETCONF operations. Each one composes a payload, runs it
//! through the RPC engine and translates `<rpc-error>` entries into the
//! matching error kind.

use crate::error::{Error, Result};
use crate::session::Session;
use netconf_proto::{Datastore, RpcReply};
use std::fmt;
use tracing::debug;

const CONFIRMED_COMMIT_CAP_PREFIX: &str = "urn:ietf:params:netconf:capability:confirmed-commit:";

/// Subtree filter for `get` and `get-config` (RFC 6241 section 6).
#[derive(Debug, Clone)]
pub struct Filter {
    body: String,
}

impl Filter {
    pub fn subtree(body: impl Into<String>) -> Filter {
        Filter { body: body.into() }
    }

    fn to_xml(&self) -> String {
        format!("<filter type=\"subtree\">{}</filter>", self.body)
    }
}

/// `action` attribute of the Juniper `<load-configuration>` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    Merge,
    Replace,
    Override,
    Update,
    Set,
}

impl LoadType {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadType::Merge => "merge",
            LoadType::Replace => "replace",
            LoadType::Override => "override",
            LoadType::Update => "update",
            LoadType::Set => "set",
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LoadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(LoadType::Merge),
            "replace" => Ok(LoadType::Replace),
            "override" => Ok(LoadType::Override),
            "update" => Ok(LoadType::Update),
            "set" => Ok(LoadType::Set),
            other => Err(format!("unknown load type '{}'", other)),
        }
    }
}

/// `<default-operation>` of `edit-config` (RFC 6241 section 7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOperation {
    Merge,
    Replace,
    None,
}

impl DefaultOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultOperation::Merge => "merge",
            DefaultOperation::Replace => "replace",
            DefaultOperation::None => "none",
        }
    }
}

impl fmt::Display for DefaultOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Session {
    /// `<get>`: running configuration plus device state.
    pub async fn get(&self, filter: Option<&Filter>) -> Result<RpcReply> {
        let payload = match filter {
            Some(filter) => format!("<get>{}</get>", filter.to_xml()),
            None => "<get/>".to_string(),
        };
        self.checked_rpc(&payload).await
    }

    /// `<get-config>` from the given datastore.
    pub async fn get_config(&self, source: Datastore, filter: Option<&Filter>) -> Result<RpcReply> {
        let filter_xml = filter.map(|f| f.to_xml()).unwrap_or_default();
        let payload = format!(
            "<get-config><source>{}</source>{}</get-config>",
            source.xml_element(),
            filter_xml
        );
        self.checked_rpc(&payload).await
    }

    /// `<lock>` the given datastore. A denial surfaces as [`Error::Lock`],
    /// typically with an `error-tag` of `lock-denied` naming the holder.
    pub async fn lock(&self, target: Datastore) -> Result<()> {
        let payload = format!("<lock><target>{}</target></lock>", target.xml_element());
        self.lock_rpc(&payload).await
    }

    /// `<unlock>` the given datastore.
    pub async fn unlock(&self, target: Datastore) -> Result<()> {
        let payload = format!("<unlock><target>{}</target></unlock>", target.xml_element());
        self.lock_rpc(&payload).await
    }

    /// `<edit-config>`: applies a `<config>` fragment to the target
    /// datastore.
    pub async fn edit_config(
        &self,
        target: Datastore,
        config: &str,
        default_operation: Option<DefaultOperation>,
    ) -> Result<RpcReply> {
        let default_op = default_operation
            .map(|op| format!("<default-operation>{op}</default-operation>"))
            .unwrap_or_default();
        let payload = format!(
            "<edit-config><target>{}</target>{}<config>{}</config></edit-config>",
            target.xml_element(),
            default_op,
            config
        );
        self.checked_rpc(&payload).await
    }

    /// Juniper `<load-configuration>` with an XML configuration fragment.
    /// `LoadType::Set` switches to text format, as set commands are not XML.
    pub async fn load_xml_configuration(
        &self,
        configuration: &str,
        load_type: LoadType,
    ) -> Result<RpcReply> {
        if load_type == LoadType::Set {
            return self.load_set_configuration(configuration).await;
        }
        let payload = format!(
            "<load-configuration action=\"{load_type}\" format=\"xml\">{configuration}</load-configuration>"
        );
        self.load_rpc(&payload).await
    }

    /// Juniper `<load-configuration>` with curly-brace configuration text.
    pub async fn load_text_configuration(
        &self,
        configuration: &str,
        load_type: LoadType,
    ) -> Result<RpcReply> {
        let payload = format!(
            "<load-configuration action=\"{load_type}\" format=\"text\"><configuration-text><![CDATA[{configuration}]]></configuration-text></load-configuration>"
        );
        self.load_rpc(&payload).await
    }

    /// Juniper `<load-configuration>` with `set`-style commands.
    pub async fn load_set_configuration(&self, configuration: &str) -> Result<RpcReply> {
        let payload = format!(
            "<load-configuration action=\"set\" format=\"text\"><configuration-set><![CDATA[{configuration}]]></configuration-set></load-configuration>"
        );
        self.load_rpc(&payload).await
    }

    /// `<commit/>` the candidate datastore.
    pub async fn commit(&self) -> Result<()> {
        self.commit_rpc("<commit/>".to_string()).await
    }

    /// Confirmed commit (RFC 6241 section 8.4): rolls back automatically
    /// unless confirmed within `confirm_timeout_secs`. A `persist` token
    /// keeps the pending confirmation alive across session drops.
    pub async fn commit_confirmed(
        &self,
        confirm_timeout_secs: u32,
        persist: Option<&str>,
    ) -> Result<()> {
        if !self
            .server_capabilities()
            .iter()
            .any(|cap| cap.starts_with(CONFIRMED_COMMIT_CAP_PREFIX))
        {
            return Err(Error::Unsupported(netconf_proto::CAP_CONFIRMED_COMMIT));
        }
        let persist_xml = persist
            .map(|token| format!("<persist>{token}</persist>"))
            .unwrap_or_default();
        let payload = format!(
            "<commit><confirmed/><confirm-timeout>{confirm_timeout_secs}</confirm-timeout>{persist_xml}</commit>"
        );
        self.commit_rpc(payload).await
    }

    /// `<cancel-commit>`: aborts a pending confirmed commit.
    pub async fn cancel_commit(&self, persist_id: Option<&str>) -> Result<()> {
        let payload = match persist_id {
            Some(id) => format!("<cancel-commit><persist-id>{id}</persist-id></cancel-commit>"),
            None => "<cancel-commit/>".to_string(),
        };
        self.commit_rpc(payload).await
    }

    /// `<validate>` the given datastore.
    pub async fn validate(&self, source: Datastore) -> Result<()> {
        let payload = format!(
            "<validate><source>{}</source></validate>",
            source.xml_element()
        );
        self.ok_rpc(&payload).await
    }

    /// `<kill-session>`: asks the server to terminate another session.
    pub async fn kill_session(&self, session_id: &str) -> Result<()> {
        let payload =
            format!("<kill-session><session-id>{session_id}</session-id></kill-session>");
        self.ok_rpc(&payload).await
    }

    /// Runs a named operation with no arguments, e.g.
    /// `get-chassis-inventory`.
    pub async fn run_command(&self, operation: &str) -> Result<RpcReply> {
        self.checked_rpc(operation).await
    }

    /// Every high-level operation funnels through one of the helpers below,
    /// which trace the payload and the reply before translating errors.
    async fn traced_rpc(&self, payload: &str) -> Result<RpcReply> {
        debug!(target: "netconf::session", payload, "running operation");
        let reply = self.rpc(payload).await?;
        debug!(target: "netconf::session", reply = %reply.to_xml(), "operation reply");
        Ok(reply)
    }

    async fn checked_rpc(&self, payload: &str) -> Result<RpcReply> {
        let reply = self.traced_rpc(payload).await?;
        if reply.has_errors() {
            return Err(Error::Rpc {
                errors: reply.errors().to_vec(),
            });
        }
        Ok(reply)
    }

    async fn ok_rpc(&self, payload: &str) -> Result<()> {
        let reply = self.traced_rpc(payload).await?;
        if !reply.is_ok() || reply.has_errors() {
            return Err(Error::Rpc {
                errors: reply.errors().to_vec(),
            });
        }
        Ok(())
    }

    async fn lock_rpc(&self, payload: &str) -> Result<()> {
        let reply = self.traced_rpc(payload).await?;
        if !reply.is_ok() || reply.has_errors() {
            return Err(Error::Lock {
                errors: reply.errors().to_vec(),
            });
        }
        Ok(())
    }

    async fn load_rpc(&self, payload: &str) -> Result<RpcReply> {
        let reply = self.traced_rpc(payload).await?;
        let results_ok = reply
            .load_results()
            .map(|results| results.ok)
            .unwrap_or_else(|| reply.is_ok());
        if !results_ok || reply.has_errors() {
            return Err(Error::Load {
                errors: reply.errors().to_vec(),
            });
        }
        Ok(reply)
    }

    async fn commit_rpc(&self, payload: String) -> Result<()> {
        let reply = self.traced_rpc(&payload).await?;
        if !reply.is_ok() || reply.has_errors() {
            return Err(Error::Commit {
                errors: reply.errors().to_vec(),
            });
        }
        Ok(())
    }
}
