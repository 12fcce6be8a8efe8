//! # IVR Analytics MCP Server
//!
//! Tool-call boundary between an external agent transport and the
//! analytics engine. The library half validates and dispatches named tool
//! calls; the binary half wires it to a newline-delimited JSON transport
//! on stdio.

pub mod tools;

pub use tools::{ToolDescriptor, ToolError, ToolRouter};
