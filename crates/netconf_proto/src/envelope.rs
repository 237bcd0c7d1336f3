//! Outbound `<rpc>` envelopes. The engine hands every request through
//! [`wrap_request`], which accepts three shapes: a bare operation element, a
//! complete `<rpc>` document, or a named operation without any markup.

use crate::NETCONF_NS;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Produces the framed-ready request document for one message id.
///
/// * `<get/>` and friends are wrapped in an `<rpc>` envelope;
/// * a full `<rpc>` document gets its `message-id` attribute set, replacing
///   any the caller put there;
/// * a plain operation name such as `get-chassis-inventory` becomes an empty
///   element inside the envelope.
pub fn wrap_request(request: &str, message_id: &str) -> Result<String, quick_xml::Error> {
    let trimmed = request.trim();
    if !trimmed.starts_with('<') {
        return Ok(format!(
            "{XML_DECLARATION}<rpc message-id=\"{message_id}\" xmlns=\"{NETCONF_NS}\"><{trimmed}/></rpc>"
        ));
    }
    if root_name(trimmed).as_deref() == Some("rpc") {
        return set_message_id(trimmed, message_id);
    }
    Ok(format!(
        "{XML_DECLARATION}<rpc message-id=\"{message_id}\" xmlns=\"{NETCONF_NS}\">{trimmed}</rpc>"
    ))
}

fn root_name(document: &str) -> Option<String> {
    let mut reader = Reader::from_str(document);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                return Some(String::from_utf8_lossy(start.local_name().as_ref()).into_owned())
            }
            Ok(Event::Empty(start)) => {
                return Some(String::from_utf8_lossy(start.local_name().as_ref()).into_owned())
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Rewrites the root element so `message-id` holds the engine-assigned value.
fn set_message_id(document: &str, message_id: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(document);
    let mut writer = Writer::new(Vec::new());
    let mut root_seen = false;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) if !root_seen => {
                root_seen = true;
                writer.write_event(Event::Start(replace_message_id(&start, message_id)?))?;
            }
            Event::Empty(start) if !root_seen => {
                root_seen = true;
                writer.write_event(Event::Empty(replace_message_id(&start, message_id)?))?;
            }
            event => writer.write_event(event)?,
        }
    }
    // the writer only ever saw events read from a &str, so this is UTF-8
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn replace_message_id<'a>(
    start: &BytesStart<'a>,
    message_id: &str,
) -> Result<BytesStart<'static>, quick_xml::Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);
    rewritten.push_attribute(("message-id", message_id));
    for attribute in start.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() != b"message-id" {
            rewritten.push_attribute(attribute);
        }
    }
    Ok(rewritten)
}
