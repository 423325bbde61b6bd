//! Metadata file format
//!
//! One record per line: `filename:id1,id2,...,idk`. The decoder skips
//! empty and malformed lines, ignores empty id tokens (older files end
//! every list with a trailing comma) and drops records with no ids.

use tracing::warn;

use crate::cluster::NodeId;

/// Encode a single record
pub fn encode_record(filename: &str, ids: &[NodeId]) -> String {
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    format!("{}:{}", filename, ids.join(","))
}

/// Encode a whole map, one record per line
pub fn encode<'a>(records: impl IntoIterator<Item = (&'a str, &'a [NodeId])>) -> String {
    let mut out = String::new();
    for (filename, ids) in records {
        out.push_str(&encode_record(filename, ids));
        out.push('\n');
    }
    out
}

/// Decode a single line. Returns `None` for lines that carry no record.
pub fn decode_record(line: &str) -> Option<(String, Vec<NodeId>)> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return None;
    }

    // The filename ends at the first colon
    let (filename, id_list) = line.split_once(':')?;
    if filename.is_empty() {
        return None;
    }

    let mut ids = Vec::new();
    for token in id_list.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<NodeId>() {
            Ok(id) => ids.push(id),
            Err(_) => {
                warn!("Skipping metadata line with bad node id {:?}: {:?}", token, line);
                return None;
            }
        }
    }

    if ids.is_empty() {
        return None;
    }

    Some((filename.to_string(), ids))
}

/// Decode every record in `content`, in file order
pub fn decode(content: &str) -> Vec<(String, Vec<NodeId>)> {
    content.lines().filter_map(decode_record).collect()
}
