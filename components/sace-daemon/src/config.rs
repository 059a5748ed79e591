//! Reads and writes the event definition file: one blank-line-separated
//! block per event, in the same line-oriented grammar the original
//! broker's `SaceEvent` persisted to disk with.
//!
//! ```text
//! service_name service_cmd
//! user   <uid | user_name>
//! group  <gid | group_name>
//! groups <gid | group_name> ...
//! seclabel secontext
//! capability capability_name ...
//! restart_on_fail <true | false>
//! trigger property:proper_name=property_value
//! trigger boot <true | false>
//! rlimits limit_name soft_limit hard_limit
//! ```

use sace_protocol::{EventFlags, EventParams, IdSpec, Params, RlimitSpec, Trigger};

use crate::error::{DaemonError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    pub name: String,
    pub command: String,
    pub flags: EventFlags,
    pub params: EventParams,
}

fn parse_id(token: &str) -> IdSpec {
    match token.parse::<u32>() {
        Ok(n) => IdSpec::Numeric(n),
        Err(_) => IdSpec::Name(token.to_string()),
    }
}

/// Parses the whole file into a list of event definitions, skipping
/// `#`-prefixed comment lines and tolerating trailing blank lines.
pub fn parse(text: &str) -> Result<Vec<EventDefinition>> {
    let mut events = Vec::new();
    let mut current: Option<(String, String, EventParams, EventFlags)> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            if let Some((name, command, params, flags)) = current.take() {
                events.push(EventDefinition { name, command, flags, params });
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if current.is_none() {
            let mut parts = line.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_string();
            let command = parts.next().unwrap_or_default().trim().to_string();
            if name.is_empty() {
                return Err(DaemonError::Config {
                    line: line_no,
                    message: "expected \"name command\" to start an event block".into(),
                });
            }
            current = Some((name, command, EventParams::default(), EventFlags::None));
            continue;
        }

        let (_, _, params, flags) = current.as_mut().expect("checked above");
        let mut parts = line.splitn(2, char::is_whitespace);
        let keyword = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        match keyword {
            "user" => params.base.uid = Some(parse_id(rest)),
            "group" => params.base.gid = Some(parse_id(rest)),
            "groups" => params.base.supplementary_gids = rest.split_whitespace().map(parse_id).collect(),
            "seclabel" => params.base.security_label = Some(rest.to_string()),
            "capability" => params.base.capabilities = rest.split_whitespace().map(str::to_string).collect(),
            "restart_on_fail" => {
                *flags = if rest == "true" {
                    EventFlags::RestartOnFail
                } else {
                    EventFlags::None
                };
            }
            "trigger" => params.triggers.push(parse_trigger(rest, line_no)?),
            "rlimits" => {
                let mut fields = rest.split_whitespace();
                let resource = fields.next().ok_or_else(|| DaemonError::Config {
                    line: line_no,
                    message: "rlimits needs a resource name".into(),
                })?;
                let soft: u64 = fields
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| DaemonError::Config { line: line_no, message: "rlimits needs a soft limit".into() })?;
                let hard: u64 = fields
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| DaemonError::Config { line: line_no, message: "rlimits needs a hard limit".into() })?;
                params.base.rlimits.push(RlimitSpec { resource: resource.to_string(), soft, hard });
            }
            other => {
                return Err(DaemonError::Config {
                    line: line_no,
                    message: format!("unknown event attribute {other:?}"),
                })
            }
        }
    }

    if let Some((name, command, params, flags)) = current.take() {
        events.push(EventDefinition { name, command, flags, params });
    }

    Ok(events)
}

fn parse_trigger(rest: &str, line_no: usize) -> Result<Trigger> {
    if let Some(spec) = rest.strip_prefix("property:") {
        let (key, value) = spec.split_once('=').ok_or_else(|| DaemonError::Config {
            line: line_no,
            message: "property trigger needs name=value".into(),
        })?;
        Ok(Trigger::Property { key: key.to_string(), value: value.to_string() })
    } else if let Some(flag) = rest.strip_prefix("boot") {
        if flag.trim() == "true" || flag.trim().is_empty() {
            Ok(Trigger::Boot)
        } else {
            Err(DaemonError::Config { line: line_no, message: "boot trigger only accepts true".into() })
        }
    } else {
        Err(DaemonError::Config { line: line_no, message: format!("unrecognized trigger {rest:?}") })
    }
}

fn format_id(id: &IdSpec) -> String {
    match id {
        IdSpec::Numeric(n) => n.to_string(),
        IdSpec::Name(name) => name.clone(),
    }
}

/// Serializes `events` back into the same grammar `parse` reads.
pub fn format(events: &[EventDefinition]) -> String {
    let mut out = String::new();
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&event.name);
        out.push(' ');
        out.push_str(&event.command);
        out.push('\n');

        let p = &event.params.base;
        if let Some(uid) = &p.uid {
            out.push_str(&format!("user {}\n", format_id(uid)));
        }
        if let Some(gid) = &p.gid {
            out.push_str(&format!("group {}\n", format_id(gid)));
        }
        if !p.supplementary_gids.is_empty() {
            let joined = p.supplementary_gids.iter().map(format_id).collect::<Vec<_>>().join(" ");
            out.push_str(&format!("groups {joined}\n"));
        }
        if let Some(label) = &p.security_label {
            out.push_str(&format!("seclabel {label}\n"));
        }
        if !p.capabilities.is_empty() {
            out.push_str(&format!("capability {}\n", p.capabilities.join(" ")));
        }
        if event.flags == EventFlags::RestartOnFail {
            out.push_str("restart_on_fail true\n");
        }
        for rl in &p.rlimits {
            out.push_str(&format!("rlimits {} {} {}\n", rl.resource, rl.soft, rl.hard));
        }
        for trigger in &event.params.triggers {
            match trigger {
                Trigger::Boot => out.push_str("trigger boot true\n"),
                Trigger::Property { key, value } => {
                    out.push_str(&format!("trigger property:{key}={value}\n"))
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_event() {
        let text = "watchdog watchdog --once\nuser system\ngroup 1000\ntrigger boot true\nrestart_on_fail true\n";
        let events = parse(text).unwrap();
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.name, "watchdog");
        assert_eq!(ev.command, "watchdog --once");
        assert_eq!(ev.params.base.uid, Some(IdSpec::Name("system".into())));
        assert_eq!(ev.params.base.gid, Some(IdSpec::Numeric(1000)));
        assert_eq!(ev.params.triggers, vec![Trigger::Boot]);
        assert_eq!(ev.flags, EventFlags::RestartOnFail);

        let formatted = format(&events);
        let reparsed = parse(&formatted).unwrap();
        assert_eq!(reparsed, events);
    }

    #[test]
    fn parses_multiple_events_separated_by_blank_lines() {
        let text = "a cmd_a\ntrigger boot true\n\nb cmd_b\ntrigger property:sys.ready=1\n";
        let events = parse(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "a");
        assert_eq!(events[1].name, "b");
        assert_eq!(
            events[1].params.triggers,
            vec![Trigger::Property { key: "sys.ready".into(), value: "1".into() }]
        );
    }

    #[test]
    fn rejects_unknown_attribute() {
        let text = "a cmd_a\nbogus value\n";
        assert!(parse(text).is_err());
    }
}
