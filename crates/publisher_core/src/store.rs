//! Single-owner store with a middleware chain.
//!
//! The store owns the current state and is driven from one thread. Follow-up
//! actions (from middleware, or from background tasks on other threads) go
//! through a [`Dispatcher`] and are queued; they are applied in arrival order
//! once the dispatch in progress has finished. The reducer is a plain
//! function without access to a dispatcher, so it cannot dispatch.

use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use publisher_logging::publish_trace;

pub type Reducer<S, A> = fn(&S, &A) -> S;

type Subscriber<S, A> = Box<dyn FnMut(&S, &A) + Send>;

/// Interceptor wrapped around the reducer.
///
/// Calling `next.run(action)` hands the action to the rest of the chain and
/// finally to the reducer; code before that call sees the old state, code
/// after it sees the new one.
pub trait Middleware<S, A>: Send {
    fn handle(&mut self, action: A, next: &mut Next<'_, S, A>) -> A;
}

/// Cloneable, thread-safe handle that queues actions for the store.
pub struct Dispatcher<A> {
    tx: mpsc::Sender<A>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A> Dispatcher<A> {
    /// Queue an action. Returns `false` once the store is gone.
    pub fn dispatch(&self, action: A) -> bool {
        self.tx.send(action).is_ok()
    }
}

impl<A> fmt::Debug for Dispatcher<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

struct Core<S, A> {
    state: Arc<S>,
    reducer: Reducer<S, A>,
    subscribers: Vec<Subscriber<S, A>>,
    dispatcher: Dispatcher<A>,
}

impl<S, A: fmt::Debug> Core<S, A> {
    fn apply(&mut self, action: A) -> A {
        publish_trace!("reduce {:?}", action);
        self.state = Arc::new((self.reducer)(&self.state, &action));
        for subscriber in &mut self.subscribers {
            subscriber(&self.state, &action);
        }
        action
    }
}

/// Remaining part of the middleware chain for one dispatch.
pub struct Next<'a, S, A> {
    chain: &'a mut [Box<dyn Middleware<S, A>>],
    core: &'a mut Core<S, A>,
}

impl<S, A: fmt::Debug> Next<'_, S, A> {
    pub fn run(&mut self, action: A) -> A {
        match self.chain.split_first_mut() {
            Some((first, rest)) => {
                let mut next = Next {
                    chain: rest,
                    core: &mut *self.core,
                };
                first.handle(action, &mut next)
            }
            None => self.core.apply(action),
        }
    }
}

impl<S, A> Next<'_, S, A> {
    /// Current state: the old one before `run`, the new one after it.
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.core.state)
    }

    pub fn dispatcher(&self) -> Dispatcher<A> {
        self.core.dispatcher.clone()
    }
}

pub struct Store<S, A> {
    core: Core<S, A>,
    middlewares: Vec<Box<dyn Middleware<S, A>>>,
    inbox: mpsc::Receiver<A>,
}

impl<S, A: fmt::Debug> Store<S, A> {
    pub fn new(reducer: Reducer<S, A>, initial_state: S) -> Self {
        let (tx, inbox) = mpsc::channel();
        Self {
            core: Core {
                state: Arc::new(initial_state),
                reducer,
                subscribers: Vec::new(),
                dispatcher: Dispatcher { tx },
            },
            middlewares: Vec::new(),
            inbox,
        }
    }

    /// Append a middleware; the first one added sees each action first.
    pub fn with_middleware(mut self, middleware: impl Middleware<S, A> + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// Register an observer called synchronously after every transition.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&S, &A) + Send + 'static) {
        self.core.subscribers.push(Box::new(subscriber));
    }

    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.core.state)
    }

    pub fn dispatcher(&self) -> Dispatcher<A> {
        self.core.dispatcher.clone()
    }

    /// Run an action through the chain, then apply everything it queued.
    pub fn dispatch(&mut self, action: A) -> A {
        let result = self.run_chain(action);
        self.drain_inbox();
        result
    }

    /// Apply every queued action without blocking. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        self.drain_inbox()
    }

    /// Block up to `timeout` for a queued action, then drain the queue.
    pub fn wait_and_process(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(action) => {
                self.run_chain(action);
                1 + self.drain_inbox()
            }
            Err(_) => 0,
        }
    }

    fn run_chain(&mut self, action: A) -> A {
        let mut next = Next {
            chain: &mut self.middlewares,
            core: &mut self.core,
        };
        next.run(action)
    }

    fn drain_inbox(&mut self) -> usize {
        let mut count = 0;
        while let Ok(action) = self.inbox.try_recv() {
            self.run_chain(action);
            count += 1;
        }
        count
    }
}
