//! Notifications delivered by the host application.

use std::collections::VecDeque;

/// A host notification the plugin reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A container finished loading.
    ContainerLoadComplete {
        /// Id of the loaded container.
        container_id: String,
    },
    /// An output device started writing the current job.
    WriteStarted {
        /// Output device name.
        output_device: String,
    },
}

impl HostEvent {
    /// Shorthand for [`HostEvent::ContainerLoadComplete`].
    pub fn container_loaded(container_id: impl Into<String>) -> Self {
        HostEvent::ContainerLoadComplete {
            container_id: container_id.into(),
        }
    }

    /// Shorthand for [`HostEvent::WriteStarted`].
    pub fn write_started(output_device: impl Into<String>) -> Self {
        HostEvent::WriteStarted {
            output_device: output_device.into(),
        }
    }
}

/// Source of host notifications, polled by the plugin.
pub trait EventSource {
    /// Next pending event, `None` when drained.
    fn next_event(&mut self) -> Option<HostEvent>;
}

/// FIFO [`EventSource`].
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<HostEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event.
    pub fn push(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    /// Pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no events are pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for EventQueue {
    fn next_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }
}

impl FromIterator<HostEvent> for EventQueue {
    fn from_iter<I: IntoIterator<Item = HostEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
