//! # Busbar Client Library
//!
//! Client library for cloud-hosted publish/subscribe brokers that expose
//! queues, topics, and subscriptions over an HTTP/Atom REST surface. The
//! library defines a backend-independent provider contract, a REST backend
//! speaking the Azure Service Bus wire protocol, and shared access signature
//! (SAS) generation for request authorization.
//!
//! ## Modules
//!
//! - [`auth`] - SAS credentials and token generation
//! - [`broker`] - Provider contract, REST backend, and provider factory
//!
//! ## Getting started
//!
//! ```no_run
//! use client::broker::{create_provider, BrokerConfig, BrokerProvider, ProviderKind};
//!
//! let config = BrokerConfig::new("my-namespace", "RootManageSharedAccessKey", "key")?;
//! let provider = create_provider(ProviderKind::Azure, config)?;
//! provider.create_queue("orders").await?;
//! ```

pub mod auth;
pub mod broker;
