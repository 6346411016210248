//! Logging and debugging facilities for the reactive graph.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output
//! - [`GraphDebug`], a text dump of a runtime's registration table
//!
//! # Tracing Integration
//!
//! Rowscope uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```
//! let _ = tracing_subscriber::fmt()
//!     .with_env_filter("rowscope_core::runtime=trace")
//!     .try_init();
//! ```

use std::fmt::Write as FmtWrite;

use crate::runtime::{NodeInfo, Runtime};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "rowscope_core";
    /// Propagation runtime: registration, drains, failures.
    pub const RUNTIME: &str = "rowscope_core::runtime";
    /// Signal writes.
    pub const SIGNAL: &str = "rowscope_core::signal";
    /// Computed recomputes and disposal.
    pub const COMPUTED: &str = "rowscope_core::computed";
}

/// Formats the registration table of a [`Runtime`] as one line per node,
/// indented by rank.
///
/// ```
/// use rowscope_core::{Computed, Runtime, Signal};
/// use rowscope_core::logging::GraphDebug;
///
/// let rt = Runtime::new();
/// let rows = Signal::new(&rt, 3);
/// let _label = Computed::new(&rt, &[&rows], {
///     let rows = rows.clone();
///     move || format!("{} rows", rows.get())
/// });
///
/// let dump = GraphDebug::new().format(&rt);
/// assert!(dump.starts_with("Reactive graph (2 nodes):"));
/// ```
#[derive(Debug, Clone)]
pub struct GraphDebug {
    indent_size: usize,
    show_edges: bool,
}

impl Default for GraphDebug {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphDebug {
    /// Create a formatter with default options.
    pub fn new() -> Self {
        Self {
            indent_size: 2,
            show_edges: true,
        }
    }

    /// Spaces of indentation per rank.
    pub fn with_indent_size(mut self, indent_size: usize) -> Self {
        self.indent_size = indent_size;
        self
    }

    /// Whether to list each node's downstream ids.
    pub fn with_edges(mut self, show_edges: bool) -> Self {
        self.show_edges = show_edges;
        self
    }

    /// Format every node of `runtime`.
    pub fn format(&self, runtime: &Runtime) -> String {
        let nodes = runtime.nodes();
        let mut output = String::new();
        writeln!(output, "Reactive graph ({} nodes):", nodes.len()).expect("write to String");
        if nodes.is_empty() {
            writeln!(output, "  (empty)").expect("write to String");
        }
        for node in &nodes {
            self.format_node(node, &mut output);
        }
        output
    }

    fn format_node(&self, node: &NodeInfo, output: &mut String) {
        let indent = " ".repeat(self.indent_size * (node.rank as usize + 1));
        write!(output, "{indent}{} {:?} rank={}", node.kind, node.id, node.rank)
            .expect("write to String");
        if self.show_edges && !node.downstream.is_empty() {
            write!(output, " -> {:?}", node.downstream).expect("write to String");
        }
        output.push('\n');
    }
}
