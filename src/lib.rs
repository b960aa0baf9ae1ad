//! session-stack library
//!
//! Command handlers behind the `session-stack` binary. Topology generation
//! itself lives in the `session_topology` crate.
//!
//! # CLI Usage
//!
//! ```bash
//! # Render every configured stack as CloudFormation JSON
//! session-stack synth --output-dir ./cdk.out
//!
//! # Three instances of the default stack, YAML output
//! session-stack synth --stack SessionStack --instances 3 --format yaml
//!
//! # Inspect derived names and security findings
//! session-stack describe --config stacks.toml
//! ```

pub mod stack;
