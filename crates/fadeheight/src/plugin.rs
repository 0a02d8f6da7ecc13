//! The plugin: dispatches host events to the augmenter and the annotator.

use fadeheight_gcode::{AnnotateOutcome, GcodeAnnotator, SceneContext, SettingsResolver};
use fadeheight_settings::{AugmentOutcome, ContainerRegistry, DefinitionAugmenter};

use crate::config::PluginConfig;
use crate::error::Result;
use crate::event::{EventSource, HostEvent};

/// What handling one event did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Result of a container load notification.
    Definition(AugmentOutcome),
    /// Result of an export notification.
    Export(AnnotateOutcome),
}

/// Fade height plugin bound to its host collaborators.
///
/// The two halves share no state; each event touches exactly one
/// collaborator set (the registry, or the resolver and scene).
pub struct FadeHeightPlugin<R, S, C> {
    registry: R,
    resolver: S,
    scene: C,
    augmenter: DefinitionAugmenter,
    annotator: GcodeAnnotator,
}

impl<R, S, C> FadeHeightPlugin<R, S, C>
where
    R: ContainerRegistry,
    S: SettingsResolver,
    C: SceneContext,
{
    /// Bind the plugin to the host's registry, settings and scene.
    pub fn new(registry: R, resolver: S, scene: C, config: &PluginConfig) -> Self {
        Self {
            registry,
            resolver,
            scene,
            augmenter: config.augmenter(),
            annotator: config.annotator(),
        }
    }

    /// Handle one host notification.
    pub fn handle_event(&mut self, event: &HostEvent) -> Result<EventOutcome> {
        match event {
            HostEvent::ContainerLoadComplete { container_id } => {
                let outcome = self
                    .augmenter
                    .on_container_load_complete(&mut self.registry, container_id)?;
                Ok(EventOutcome::Definition(outcome))
            }
            HostEvent::WriteStarted { output_device } => {
                tracing::debug!(device = %output_device, "export started");
                let outcome = self.annotator.on_write_started(&self.resolver, &mut self.scene);
                Ok(EventOutcome::Export(outcome))
            }
        }
    }

    /// Handle events until the source runs dry.
    pub fn drain<E>(&mut self, source: &mut E) -> Result<Vec<EventOutcome>>
    where
        E: EventSource + ?Sized,
    {
        let mut outcomes = Vec::new();
        while let Some(event) = source.next_event() {
            outcomes.push(self.handle_event(&event)?);
        }
        Ok(outcomes)
    }

    /// Container registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Mutable container registry, for the host to load containers.
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    /// Settings resolver.
    pub fn resolver(&self) -> &S {
        &self.resolver
    }

    /// Mutable settings resolver.
    pub fn resolver_mut(&mut self) -> &mut S {
        &mut self.resolver
    }

    /// Scene context.
    pub fn scene(&self) -> &C {
        &self.scene
    }

    /// Mutable scene context, for the host to hand over new G-code.
    pub fn scene_mut(&mut self) -> &mut C {
        &mut self.scene
    }

    /// Release the collaborators.
    pub fn into_parts(self) -> (R, S, C) {
        (self.registry, self.resolver, self.scene)
    }
}
