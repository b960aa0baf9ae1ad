//! Multi-instance topology generation for session deployments.
//!
//! This crate derives the infrastructure for N parallel session instances
//! sharing one VPC and renders it as a CloudFormation template. Each instance
//! gets its own ECS cluster, EFS storage mount, IAM roles and three services
//! (service node, storage server, lokinet overlay router).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      session-stack CLI                       │
//! │              synth | describe | list                         │
//! └──────────────────────────────────────────────────────────────┘
//!                               │ AppConfig / StackSettings
//!                               ▼
//!                   ┌──────────────────────┐
//!                   │  TopologyGenerator   │
//!                   └──────────────────────┘
//!                               │
//!        ┌──────────────────────┼──────────────────────┐
//!        ▼                      ▼                      ▼
//! ┌─────────────┐        ┌─────────────┐        ┌─────────────┐
//! │ Instance 1  │        │ Instance 2  │        │ Instance N  │
//! │ sessionEfs  │        │ sessionEfs-2│        │ sessionEfs-N│
//! └─────────────┘        └─────────────┘        └─────────────┘
//!        └──────────────────────┼──────────────────────┘
//!                               ▼
//!           ┌────────────────────────────────────────┐
//!           │ NetworkContext (one VPC, 7 ingress     │
//!           │ rules shared by every instance)        │
//!           └────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                  CloudFormation template
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! session-stack synth --instances 3 --output-dir ./cdk.out
//! session-stack describe --stack SessionStack
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod generator;
pub mod iam;
pub mod naming;
pub mod network;
pub mod service;
pub mod storage;
pub mod token;
pub mod topology;

pub use cli::*;
pub use config::*;
pub use error::*;
pub use generator::*;
pub use topology::*;
