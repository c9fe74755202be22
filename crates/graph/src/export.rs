//! Graph serializers.
//!
//! GML follows the layout networkx writes, GraphML declares a typed key
//! per attribute, and JSON is the [`GraphSnapshot`](crate::GraphSnapshot)
//! for tooling.

use crate::error::{GraphError, Result};
use crate::types::{CodeGraph, GraphNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Output format of a serialized graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    #[default]
    Gml,
    #[serde(rename = "graphml")]
    GraphMl,
    Json,
}

impl GraphFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Gml => "gml",
            Self::GraphMl => "graphml",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for GraphFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gml" => Ok(Self::Gml),
            "graphml" | "xml" => Ok(Self::GraphMl),
            "json" => Ok(Self::Json),
            other => Err(GraphError::InvalidConfig(format!("unknown graph format: {other}"))),
        }
    }
}

/// Node attribute names and GraphML types, in output order
const NODE_ATTRIBUTES: [(&str, &str); 7] = [
    ("label", "string"),
    ("declaration_file", "string"),
    ("start_line", "int"),
    ("end_line", "int"),
    ("column", "int"),
    ("namespace_position", "string"),
    ("node_type", "string"),
];

enum Value<'a> {
    Text(&'a str),
    Int(u32),
}

/// Attribute values of `node`, aligned with [`NODE_ATTRIBUTES`]
fn values(node: &GraphNode) -> [Value<'_>; 7] {
    [
        Value::Text(&node.label),
        Value::Text(&node.declaration_file),
        Value::Int(node.start_line),
        Value::Int(node.end_line),
        Value::Int(node.column),
        Value::Text(&node.namespace_position),
        Value::Text(node.kind.as_str()),
    ]
}

/// Serialize `graph` in `format`
pub fn write_graph(graph: &CodeGraph, format: GraphFormat, writer: impl Write) -> Result<()> {
    match format {
        GraphFormat::Gml => write_gml(graph, writer),
        GraphFormat::GraphMl => write_graphml(graph, writer),
        GraphFormat::Json => write_json(graph, writer),
    }
}

/// Serialize into a string
pub fn graph_to_string(graph: &CodeGraph, format: GraphFormat) -> Result<String> {
    let mut buffer = Vec::new();
    write_graph(graph, format, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| GraphError::BuildError(format!("non UTF-8 output: {e}")))
}

pub fn write_gml(graph: &CodeGraph, mut w: impl Write) -> Result<()> {
    let mut ids = HashMap::new();
    writeln!(w, "graph [")?;
    writeln!(w, "  directed 1")?;
    for (position, (idx, node)) in graph.nodes().enumerate() {
        ids.insert(idx, position);
        writeln!(w, "  node [")?;
        writeln!(w, "    id {position}")?;
        for ((name, _), value) in NODE_ATTRIBUTES.iter().zip(values(node)) {
            match value {
                Value::Text(text) => writeln!(w, "    {name} \"{}\"", escape_gml(text))?,
                Value::Int(n) => writeln!(w, "    {name} {n}")?,
            }
        }
        writeln!(w, "  ]")?;
    }
    for (source, target, relation) in graph.edges() {
        let (Some(source), Some(target)) = (ids.get(&source), ids.get(&target)) else {
            continue;
        };
        writeln!(w, "  edge [")?;
        writeln!(w, "    source {source}")?;
        writeln!(w, "    target {target}")?;
        writeln!(w, "    relation \"{relation}\"")?;
        writeln!(w, "  ]")?;
    }
    writeln!(w, "]")?;
    Ok(())
}

pub fn write_graphml(graph: &CodeGraph, mut w: impl Write) -> Result<()> {
    writeln!(w, "<?xml version='1.0' encoding='utf-8'?>")?;
    writeln!(
        w,
        "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
         http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">"
    )?;

    for (i, (name, ty)) in NODE_ATTRIBUTES.iter().enumerate() {
        writeln!(w, "  <key id=\"d{i}\" for=\"node\" attr.name=\"{name}\" attr.type=\"{ty}\" />")?;
    }
    let relation_key = format!("d{}", NODE_ATTRIBUTES.len());
    writeln!(w, "  <key id=\"{relation_key}\" for=\"edge\" attr.name=\"relation\" attr.type=\"string\" />")?;

    writeln!(w, "  <graph edgedefault=\"directed\">")?;
    for (_, node) in graph.nodes() {
        writeln!(w, "    <node id=\"{}\">", escape_xml(&node.key))?;
        for (i, value) in values(node).into_iter().enumerate() {
            let text = match value {
                Value::Text(text) => escape_xml(text),
                Value::Int(n) => n.to_string(),
            };
            writeln!(w, "      <data key=\"d{i}\">{text}</data>")?;
        }
        writeln!(w, "    </node>")?;
    }
    for (source, target, relation) in graph.edges() {
        let (Some(source), Some(target)) = (graph.get_node(source), graph.get_node(target)) else {
            continue;
        };
        writeln!(
            w,
            "    <edge source=\"{}\" target=\"{}\">",
            escape_xml(&source.key),
            escape_xml(&target.key)
        )?;
        writeln!(w, "      <data key=\"{relation_key}\">{relation}</data>")?;
        writeln!(w, "    </edge>")?;
    }
    writeln!(w, "  </graph>")?;
    writeln!(w, "</graphml>")?;
    Ok(())
}

pub fn write_json(graph: &CodeGraph, mut w: impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut w, &graph.snapshot())
        .map_err(|e| GraphError::BuildError(format!("JSON serialization failed: {e}")))?;
    writeln!(w)?;
    Ok(())
}

/// GML strings may not hold `"`; `&` starts an entity. Non-ASCII goes
/// out as numeric character references.
fn escape_gml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => out.push_str(&format!("&#{};", c as u32)),
        }
    }
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
