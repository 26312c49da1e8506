//! Audio parameters.
//!
//! A parameter's intrinsic value lives in an atomic shared between client
//! handles and the render thread. Each quantum the render side expands it
//! into a block of values, adds any node outputs driving the parameter
//! (mixed down to mono), and clamps to the declared range.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::bus::AudioBus;
use crate::channel::ChannelInterpretation;
use crate::compat::Arc;
use crate::context::{ContextShared, PendingChange};
use crate::lockfree::AtomicFloat;
use crate::node::{NodeState, OutputRef, ParamRef};
use crate::processor::RenderQuantum;
use crate::render::{edge_list, output_bus, NodeSlots};
use crate::{Error, Result};

/// Evaluation rate of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutomationRate {
    /// One value per frame.
    #[default]
    ARate,
    /// One value per quantum.
    KRate,
}

/// Declared name, default and range of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub default_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub rate: AutomationRate,
}

impl ParamDescriptor {
    /// Unbounded a-rate parameter.
    pub fn new(name: impl Into<String>, default_value: f32) -> Self {
        Self {
            name: name.into(),
            default_value,
            min_value: f32::MIN,
            max_value: f32::MAX,
            rate: AutomationRate::ARate,
        }
    }

    pub fn range(mut self, min_value: f32, max_value: f32) -> Self {
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    pub fn k_rate(mut self) -> Self {
        self.rate = AutomationRate::KRate;
        self
    }

    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min_value, self.max_value)
    }
}

/// Curve evaluation hook. Runs on the render thread.
///
/// `fill` writes intrinsic values for the block starting at `start_time`
/// and returns `true`; returning `false` means the curve contributes
/// nothing this block and the stored value is used instead.
pub trait ParamAutomation: Send {
    fn fill(&mut self, start_time: f64, sample_rate: f64, values: &mut [f32]) -> bool;
}

impl<F> ParamAutomation for F
where
    F: FnMut(f64, f64, &mut [f32]) -> bool + Send,
{
    fn fill(&mut self, start_time: f64, sample_rate: f64, values: &mut [f32]) -> bool {
        self(start_time, sample_rate, values)
    }
}

/// Values shared between the client handle and the render state.
#[derive(Debug)]
pub(crate) struct ParamShared {
    pub descriptor: ParamDescriptor,
    pub value: AtomicFloat,
    pub final_value: AtomicFloat,
}

impl ParamShared {
    pub fn new(descriptor: ParamDescriptor) -> Self {
        let default = descriptor.default_value;
        Self {
            descriptor,
            value: AtomicFloat::new(default),
            final_value: AtomicFloat::new(default),
        }
    }
}

/// Render-thread side of a parameter.
pub(crate) struct ParamRender {
    shared: Arc<ParamShared>,
    automation: Option<Box<dyn ParamAutomation>>,
    pub rendering_outputs: Vec<OutputRef>,
    values: Vec<f32>,
    summing: AudioBus,
}

impl ParamRender {
    pub fn new(shared: Arc<ParamShared>, frames: usize) -> Self {
        Self {
            shared,
            automation: None,
            rendering_outputs: edge_list(),
            values: vec![0.0; frames],
            summing: AudioBus::with_capacity(1, frames, 1),
        }
    }

    /// Installs `automation` and returns the curve it replaces.
    pub fn set_automation(
        &mut self,
        automation: Option<Box<dyn ParamAutomation>>,
    ) -> Option<Box<dyn ParamAutomation>> {
        core::mem::replace(&mut self.automation, automation)
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Fills the block for this quantum. Driving nodes must already have
    /// been processed.
    pub fn compute(&mut self, quantum: &RenderQuantum, slots: &NodeSlots) {
        let automated = match self.automation.as_mut() {
            Some(curve) => curve.fill(quantum.current_time(), quantum.sample_rate, &mut self.values),
            None => false,
        };
        if !automated {
            self.values.fill(self.shared.value.get());
        }

        if !self.rendering_outputs.is_empty() {
            self.summing.zero();
            for src in &self.rendering_outputs {
                if let Some(bus) = output_bus(slots, *src) {
                    self.summing.sum_from(bus, ChannelInterpretation::Speakers);
                }
            }
            if !self.summing.is_silent() {
                for (v, s) in self.values.iter_mut().zip(self.summing.channel(0)) {
                    *v += *s;
                }
            }
        }

        let descriptor = &self.shared.descriptor;
        match descriptor.rate {
            AutomationRate::KRate => {
                let first = descriptor.clamp(self.values.first().copied().unwrap_or(0.0));
                self.values.fill(first);
            }
            AutomationRate::ARate => {
                for v in &mut self.values {
                    *v = descriptor.clamp(*v);
                }
            }
        }
        if let Some(&first) = self.values.first() {
            self.shared.final_value.set(first);
        }
    }
}

/// Client handle to one parameter of a node.
#[derive(Clone)]
pub struct AudioParam {
    pub(crate) shared: Arc<ParamShared>,
    pub(crate) node: Arc<NodeState>,
    pub(crate) param: ParamRef,
    pub(crate) context: Arc<ContextShared>,
}

impl fmt::Debug for AudioParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioParam")
            .field("name", &self.shared.descriptor.name)
            .field("node", &self.param.node)
            .field("value", &self.value())
            .finish()
    }
}

impl AudioParam {
    pub fn name(&self) -> &str {
        &self.shared.descriptor.name
    }

    pub fn descriptor(&self) -> &ParamDescriptor {
        &self.shared.descriptor
    }

    pub fn param_ref(&self) -> ParamRef {
        self.param
    }

    /// Intrinsic value.
    pub fn value(&self) -> f32 {
        self.shared.value.get()
    }

    /// Sets the intrinsic value; clamped when evaluated.
    pub fn set_value(&self, value: f32) -> Result<()> {
        self.check_live()?;
        if !value.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "{} value must be finite, got {}",
                self.name(),
                value
            )));
        }
        self.shared.value.set(value);
        Ok(())
    }

    /// First value of the most recently rendered block, driving outputs
    /// included.
    pub fn final_value(&self) -> f32 {
        self.shared.final_value.get()
    }

    /// Installs a curve evaluated on the render thread from the next quantum.
    pub fn set_automation(&self, automation: impl ParamAutomation + 'static) -> Result<()> {
        self.check_live()?;
        self.context.enqueue(PendingChange::Automation {
            param: self.param,
            automation: Some(Box::new(automation)),
        })
    }

    pub fn clear_automation(&self) -> Result<()> {
        self.check_live()?;
        self.context.enqueue(PendingChange::Automation {
            param: self.param,
            automation: None,
        })
    }

    fn check_live(&self) -> Result<()> {
        if self.node.is_marked_for_deletion() {
            return Err(Error::InvalidState(format!(
                "param {} belongs to {}, which is marked for deletion",
                self.name(),
                self.param.node
            )));
        }
        Ok(())
    }
}
