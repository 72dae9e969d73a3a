//! Streaming equi-join of two flows.
//!
//! Both sides are polled as they produce. Every arriving item is buffered
//! under its key and matched against the items already seen on the other
//! side, so a match is emitted as soon as both halves exist. Nothing is
//! materialized up front, which lets a consumer stop after a few matches.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::mode::ScheduleMode;
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Join key that may be missing. Two missing keys match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey<K> {
    Absent,
    Present(K),
}

impl<K> From<Option<K>> for JoinKey<K> {
    fn from(key: Option<K>) -> Self {
        match key {
            Some(key) => JoinKey::Present(key),
            None => JoinKey::Absent,
        }
    }
}

type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;
type ResultFn<L, R, O> = Arc<dyn Fn(&L, &R) -> O + Send + Sync>;

enum Side<L, R> {
    Left(L),
    Right(R),
}

struct Matcher<L, R, K, O> {
    left_key: KeyFn<L, K>,
    right_key: KeyFn<R, K>,
    result: ResultFn<L, R, O>,
    lefts: HashMap<K, Vec<L>>,
    rights: HashMap<K, Vec<R>>,
}

impl<L, R, K: Eq + Hash, O> Matcher<L, R, K, O> {
    fn accept(&mut self, side: Side<L, R>) -> Vec<O> {
        match side {
            Side::Left(left) => {
                let key = (self.left_key)(&left);
                let matches = self
                    .rights
                    .get(&key)
                    .map(|rights| rights.iter().map(|right| (self.result)(&left, right)).collect())
                    .unwrap_or_default();
                self.lefts.entry(key).or_default().push(left);
                matches
            }
            Side::Right(right) => {
                let key = (self.right_key)(&right);
                let matches = self
                    .lefts
                    .get(&key)
                    .map(|lefts| lefts.iter().map(|left| (self.result)(left, &right)).collect())
                    .unwrap_or_default();
                self.rights.entry(key).or_default().push(right);
                matches
            }
        }
    }
}

pub struct Join<L, R, K, O> {
    left: Flow<L>,
    right: Flow<R>,
    left_key: KeyFn<L, K>,
    right_key: KeyFn<R, K>,
    result: ResultFn<L, R, O>,
}

impl<L, R, K, O> Operator<O> for Join<L, R, K, O>
where
    L: Send + 'static,
    R: Send + 'static,
    K: Eq + Hash + Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        "Join"
    }

    /// Combined mode of both sides, passed on to downstream operators.
    /// Join output itself is a merge that follows match order, whatever
    /// ordering this mode names.
    fn mode(&self) -> ScheduleMode {
        self.left.mode().combine(self.right.mode())
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<O> {
        let scope = ctx.child();
        let left = self.left.open(&scope).map(|item| item.map(Side::Left));
        let right = self.right.open(&scope).map(|item| item.map(Side::Right));
        let matcher = Matcher {
            left_key: self.left_key.clone(),
            right_key: self.right_key.clone(),
            result: self.result.clone(),
            lefts: HashMap::new(),
            rights: HashMap::new(),
        };
        let matched = stream::select(left, right)
            .scan(matcher, |matcher, item| {
                let batch: Vec<PipelineResult<O>> = match item {
                    Ok(side) => matcher.accept(side).into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(err)],
                };
                future::ready(Some(stream::iter(batch)))
            })
            .flatten();
        Cursor::new(matched, &scope)
    }
}

impl<L: Send + 'static> Flow<L> {
    /// Pair items of `self` and `other` whose keys are equal.
    pub fn join<R, K, O, LK, RK, F>(&self, other: &Flow<R>, left_key: LK, right_key: RK, result: F) -> Flow<O>
    where
        R: Send + 'static,
        K: Eq + Hash + Send + 'static,
        O: Send + 'static,
        LK: Fn(&L) -> K + Send + Sync + 'static,
        RK: Fn(&R) -> K + Send + Sync + 'static,
        F: Fn(&L, &R) -> O + Send + Sync + 'static,
    {
        Flow::new(Join {
            left: self.clone(),
            right: other.clone(),
            left_key: Arc::new(left_key),
            right_key: Arc::new(right_key),
            result: Arc::new(result),
        })
    }

    /// Like [`Flow::join`] for keys that may be missing; items without a key
    /// match other items without a key.
    pub fn join_by_optional_key<R, K, O, LK, RK, F>(
        &self,
        other: &Flow<R>,
        left_key: LK,
        right_key: RK,
        result: F,
    ) -> Flow<O>
    where
        R: Send + 'static,
        K: Eq + Hash + Send + 'static,
        O: Send + 'static,
        LK: Fn(&L) -> Option<K> + Send + Sync + 'static,
        RK: Fn(&R) -> Option<K> + Send + Sync + 'static,
        F: Fn(&L, &R) -> O + Send + Sync + 'static,
    {
        self.join(
            other,
            move |l| JoinKey::from(left_key(l)),
            move |r| JoinKey::from(right_key(r)),
            result,
        )
    }
}
