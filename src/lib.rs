#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(docsrs, loom)))]
#![warn(missing_docs, missing_debug_implementations)]

#[macro_use]
pub mod util;

pub(crate) mod loom;

pub mod event;
pub mod future;
#[cfg(not(loom))]
pub mod pool;
pub mod schedule;
pub mod task_set;

#[doc(inline)]
pub use self::event::CompletionEvent;
#[doc(inline)]
pub use self::future::{make_ready_future, spawn, when_all, Future, Launch, WaitStatus, WhenAll};
#[cfg(not(loom))]
#[doc(inline)]
pub use self::pool::ThreadPool;
#[doc(inline)]
pub use self::schedule::{Immediate, Intercept, Job, Schedule};
#[doc(inline)]
pub use self::task_set::{TaskCounter, TaskSet};
