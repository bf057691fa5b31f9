//! Pass 6 — synchronization insertion (spec §4.4 step 6).
//!
//! Scans the reference loop body for a write to a shared-memory buffer
//! followed by a read of that same buffer and inserts a block-level
//! `Sync` between them. None of this crate's built-in scheduling
//! heuristics currently produce a `Shared` tensor view, so this pass is
//! a no-op on their output today; it exists for fusions a caller builds
//! (or schedules) with explicit shared-memory staging.

use crate::error::Result;
use crate::ir::Fusion;
use crate::kir::{IrBuilder, KirId, KirNode};
use crate::lower::LoweringCtx;
use crate::types::MemoryType;
use std::collections::HashSet;

pub fn run(_fusion: &Fusion, ctx: &mut LoweringCtx) -> Result<()> {
    let LoweringCtx { kernel, ref_loops, .. } = ctx;
    let scope = ref_loops.last().copied();
    let mut builder = IrBuilder::new(kernel);

    let body: Vec<KirId> = match scope {
        Some(id) => builder
            .kernel_mut()
            .node(id)
            .and_then(|n| n.body().map(|b| b.to_vec()))
            .unwrap_or_default(),
        None => builder.kernel_mut().top_level_exprs().to_vec(),
    };

    let mut shared_buffers: HashSet<KirId> = HashSet::new();
    for &id in &body {
        if let Some(KirNode::Allocate {
            buffer,
            memory_type: MemoryType::Shared,
            ..
        }) = builder.kernel_mut().node(id)
        {
            shared_buffers.insert(*buffer);
        }
    }
    if shared_buffers.is_empty() {
        return Ok(());
    }

    let mut new_body = Vec::with_capacity(body.len() + 2);
    let mut pending_write = false;
    for id in body {
        let node = builder.kernel_mut().node(id).cloned();
        let reads_shared = node
            .as_ref()
            .and_then(operand_reads)
            .map(|ins| ins.iter().any(|r| shared_buffers.contains(r)))
            .unwrap_or(false);
        if reads_shared && pending_write {
            new_body.push(builder.sync());
            pending_write = false;
        }
        if let Some(out) = node.as_ref().and_then(|n| n.output()) {
            if shared_buffers.contains(&out) {
                pending_write = true;
            }
        }
        new_body.push(id);
    }

    match scope {
        Some(id) => {
            if let Some(n) = builder.kernel_mut().node_mut(id) {
                if let Some(b) = n.body_mut() {
                    *b = new_body;
                }
            }
        }
        None => builder.kernel_mut().set_top_level_exprs(new_body),
    }
    Ok(())
}

fn operand_reads(node: &KirNode) -> Option<Vec<KirId>> {
    match node {
        KirNode::UnaryOp { input, .. } => Some(vec![*input]),
        KirNode::BinaryOp { lhs, rhs, .. } => Some(vec![*lhs, *rhs]),
        KirNode::TernaryOp { a, b, c, .. } => Some(vec![*a, *b, *c]),
        KirNode::BroadcastOp { input, .. } => Some(vec![*input]),
        KirNode::ReductionOp { input, .. } => Some(vec![*input]),
        _ => None,
    }
}
