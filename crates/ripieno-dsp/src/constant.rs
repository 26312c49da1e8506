//! Constant-value source.

use std::ops::Deref;

use ripieno_core::{
    Arc, AudioContext, AudioNode, AudioParam, AudioProcessor, NodeInfo, NodeType, ParamDescriptor,
    ProcessContext, RenderQuantum,
};

use crate::scheduled::Schedule;
use crate::Result;

const OFFSET: usize = 0;

pub(crate) struct ConstantProcessor {
    schedule: Arc<Schedule>,
}

impl AudioProcessor for ConstantProcessor {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let Some(bus) = ctx.outputs.bus_mut(0) else {
            return;
        };
        let Some((begin, end)) = self.schedule.active_frames(&ctx.quantum) else {
            bus.zero();
            return;
        };
        let offset = ctx.params.values(OFFSET);
        let out = bus.channel_mut(0);
        out[..begin].fill(0.0);
        for (sample, value) in out[begin..end].iter_mut().zip(&offset[begin..end]) {
            *sample = *value;
        }
        out[end..].fill(0.0);
    }

    fn propagates_silence(&self, quantum: &RenderQuantum, _last_non_silent_time: f64) -> bool {
        !self.schedule.is_playing(quantum)
    }
}

/// Mono source emitting its a-rate `offset` parameter while playing.
#[derive(Debug, Clone)]
pub struct ConstantSourceNode {
    node: AudioNode,
    offset: AudioParam,
    schedule: Arc<Schedule>,
}

impl ConstantSourceNode {
    pub fn new(context: &AudioContext, offset: f32) -> Result<Self> {
        let info = NodeInfo::new(NodeType::ConstantSource)
            .output(1)
            .param(ParamDescriptor::new("offset", offset));
        let schedule = Schedule::shared();
        let node = context.create_node(
            info,
            ConstantProcessor {
                schedule: schedule.clone(),
            },
        )?;
        Ok(Self {
            offset: node.param(OFFSET)?,
            node,
            schedule,
        })
    }

    pub fn offset(&self) -> &AudioParam {
        &self.offset
    }

    pub fn start(&self, when: f64) -> Result<()> {
        self.schedule.start(when)
    }

    pub fn stop(&self, when: f64) -> Result<()> {
        self.schedule.stop(when)
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn node(&self) -> &AudioNode {
        &self.node
    }
}

impl Deref for ConstantSourceNode {
    type Target = AudioNode;

    fn deref(&self) -> &AudioNode {
        &self.node
    }
}
