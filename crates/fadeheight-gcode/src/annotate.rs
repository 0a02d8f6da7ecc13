//! Injecting the `M420` command into exported plates.

use std::fmt;

use fadeheight_settings::{SettingSpec, ABL_ENABLED_KEY, FADE_HEIGHT_KEY, MACHINE_START_GCODE_KEY};

use crate::command::{FadeHeightCommand, M420_MNEMONIC, PROCESSED_MARKER};
use crate::plate::{GcodePlateSet, PlateId};
use crate::resolver::{SettingsResolver, StackRef};
use crate::scene::SceneContext;

/// Why an export was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No active machine configuration.
    NoMachine,
    /// The job uses no extruders.
    NoUsedExtruders,
    /// The machine start G-code already sets `M420` itself.
    StartGcodeHasCommand,
    /// The scene has no G-code.
    NoGcode,
    /// Leveling off with zero fade height and inactive skipping enabled.
    Inactive,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoMachine => "no active machine",
            SkipReason::NoUsedExtruders => "no used extruders",
            SkipReason::StartGcodeHasCommand => "start gcode already contains M420",
            SkipReason::NoGcode => "scene has no gcode to process",
            SkipReason::Inactive => "leveling disabled with zero fade height",
        };
        f.write_str(text)
    }
}

impl SkipReason {
    /// True for skips the user should hear about. The rest are routine.
    pub fn is_warning(&self) -> bool {
        matches!(self, SkipReason::NoGcode)
    }
}

/// What happened to one plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateStatus {
    /// Command and marker were appended.
    Annotated,
    /// Marker already present; left byte-identical.
    AlreadyProcessed,
    /// Fewer than two blocks; nothing to annotate.
    NoLayers,
}

/// Per-plate results of one annotation pass, in plate order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    /// Status of every plate.
    pub plates: Vec<(PlateId, PlateStatus)>,
}

impl AnnotationReport {
    /// True if any plate was annotated.
    pub fn changed(&self) -> bool {
        self.count(PlateStatus::Annotated) > 0
    }

    /// Number of plates with the given status.
    pub fn count(&self, status: PlateStatus) -> usize {
        self.plates.iter().filter(|(_, s)| *s == status).count()
    }

    /// Status of a plate.
    pub fn status(&self, plate: &PlateId) -> Option<PlateStatus> {
        self.plates
            .iter()
            .find(|(id, _)| id == plate)
            .map(|(_, status)| *status)
    }
}

/// Result of handling an export notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotateOutcome {
    /// Preconditions not met; nothing touched.
    Skipped(SkipReason),
    /// Plates were examined.
    Processed {
        /// Command injected into annotated plates.
        command: FadeHeightCommand,
        /// Per-plate results.
        report: AnnotationReport,
        /// Whether the plate set was written back to the scene.
        written: bool,
    },
}

/// Injects the fade height command into exported G-code.
#[derive(Debug, Clone, Default)]
pub struct GcodeAnnotator {
    skip_when_inactive: bool,
}

impl GcodeAnnotator {
    /// Annotator that always injects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip injection when leveling is off and the fade height is zero.
    pub fn with_skip_when_inactive(mut self, skip: bool) -> Self {
        self.skip_when_inactive = skip;
        self
    }

    /// Handle an "export started" notification.
    ///
    /// Failed preconditions return [`AnnotateOutcome::Skipped`] without
    /// touching the scene. The scene is written back only when at least one
    /// plate changed.
    pub fn on_write_started<S, C>(&self, resolver: &S, scene: &mut C) -> AnnotateOutcome
    where
        S: SettingsResolver + ?Sized,
        C: SceneContext + ?Sized,
    {
        if !resolver.has_machine() {
            return skip(SkipReason::NoMachine);
        }
        if resolver.used_extruders().is_empty() {
            return skip(SkipReason::NoUsedExtruders);
        }

        let start_gcode = resolver
            .resolve_value(StackRef::Global, MACHINE_START_GCODE_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        if start_gcode.contains(M420_MNEMONIC) {
            return skip(SkipReason::StartGcodeHasCommand);
        }

        let command = self.resolve_command(resolver);

        let mut plates = match scene.gcode_dict() {
            Some(plates) if !plates.is_empty() => plates,
            _ => return skip(SkipReason::NoGcode),
        };

        if self.skip_when_inactive && command.is_inactive() {
            return skip(SkipReason::Inactive);
        }

        let report = self.annotate_plates(&mut plates, &command);
        let written = report.changed();
        if written {
            scene.set_gcode_dict(plates);
            tracing::info!(
                annotated = report.count(PlateStatus::Annotated),
                plates = report.plates.len(),
                "injected fade height command"
            );
        }

        AnnotateOutcome::Processed {
            command,
            report,
            written,
        }
    }

    /// Read the leveling flag and fade height from the global stack.
    ///
    /// Missing or non-numeric values fall back to the setting defaults.
    pub fn resolve_command<S>(&self, resolver: &S) -> FadeHeightCommand
    where
        S: SettingsResolver + ?Sized,
    {
        let enabled = resolver
            .resolve_value(StackRef::Global, ABL_ENABLED_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or_else(|| {
                tracing::debug!(key = ABL_ENABLED_KEY, "no resolved value, using default");
                default_of(ABL_ENABLED_KEY).and_then(|v| v.as_bool()).unwrap_or(false)
            });
        let fade_height_mm = resolver
            .resolve_value(StackRef::Global, FADE_HEIGHT_KEY)
            .and_then(|value| value.as_f64())
            .unwrap_or_else(|| {
                tracing::debug!(key = FADE_HEIGHT_KEY, "no resolved value, using default");
                default_of(FADE_HEIGHT_KEY).and_then(|v| v.as_f64()).unwrap_or(0.0)
            });
        FadeHeightCommand::new(enabled, fade_height_mm)
    }

    /// Append `command` to block 1 of every unprocessed plate and mark it.
    ///
    /// Plates too short to annotate and plates already marked are left as
    /// they are; neither stops the remaining plates.
    pub fn annotate_plates(
        &self,
        plates: &mut GcodePlateSet,
        command: &FadeHeightCommand,
    ) -> AnnotationReport {
        let line = command.to_string();
        let mut report = AnnotationReport::default();

        for (plate_id, blocks) in plates.iter_mut() {
            let status = if blocks.len() < 2 {
                tracing::warn!(plate = %plate_id, "plate does not contain any layers");
                PlateStatus::NoLayers
            } else if blocks[0].contains(PROCESSED_MARKER) {
                tracing::debug!(plate = %plate_id, "plate has already been processed");
                PlateStatus::AlreadyProcessed
            } else {
                blocks[1].push_str(&line);
                blocks[0].push_str(PROCESSED_MARKER);
                PlateStatus::Annotated
            };
            report.plates.push((plate_id.clone(), status));
        }

        report
    }
}

fn skip(reason: SkipReason) -> AnnotateOutcome {
    if reason.is_warning() {
        tracing::warn!(%reason, "skipping gcode annotation");
    } else {
        tracing::debug!(%reason, "skipping gcode annotation");
    }
    AnnotateOutcome::Skipped(reason)
}

fn default_of(key: &str) -> Option<&'static fadeheight_settings::SettingValue> {
    SettingSpec::find(key).map(|spec| &spec.default_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FixedSettings;
    use crate::scene::MemoryScene;

    fn blocks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn settings(enabled: bool, height: f64) -> FixedSettings {
        FixedSettings::machine()
            .with_used_extruder(0)
            .with_global(ABL_ENABLED_KEY, enabled)
            .with_global(FADE_HEIGHT_KEY, height)
            .with_global(MACHINE_START_GCODE_KEY, "G28 ; home\nG29 ; probe\n")
    }

    fn single_plate() -> GcodePlateSet {
        let mut plates = GcodePlateSet::new();
        plates.insert(0i64, blocks(&["", "G1 X0 Y0\n"]));
        plates
    }

    #[test]
    fn test_insertion() {
        let mut scene = MemoryScene::with_gcode(single_plate());
        let outcome = GcodeAnnotator::new().on_write_started(&settings(true, 3.7), &mut scene);

        assert!(matches!(outcome, AnnotateOutcome::Processed { written: true, .. }));
        let plate = scene.plates().unwrap().get(&PlateId::Index(0)).unwrap();
        assert_eq!(plate[0], ";FADEHEIGHTPROCESSED\n");
        assert_eq!(plate[1], "G1 X0 Y0\nM420 S1 Z3 ;added by FadeHeightSettingPlugin\n");
        assert_eq!(scene.write_count(), 1);
    }

    #[test]
    fn test_rerun_is_noop() {
        let annotator = GcodeAnnotator::new();
        let resolver = settings(true, 3.7);
        let mut scene = MemoryScene::with_gcode(single_plate());
        annotator.on_write_started(&resolver, &mut scene);
        let first = scene.plates().unwrap().clone();

        let outcome = annotator.on_write_started(&resolver, &mut scene);
        match outcome {
            AnnotateOutcome::Processed { report, written, .. } => {
                assert!(!written);
                assert_eq!(report.status(&PlateId::Index(0)), Some(PlateStatus::AlreadyProcessed));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(scene.plates().unwrap(), &first);
        assert_eq!(scene.write_count(), 1);
    }

    #[test]
    fn test_user_m420_in_start_gcode() {
        let resolver =
            settings(true, 5.0).with_global(MACHINE_START_GCODE_KEY, "G28\nM420 S1 Z10\n");
        let mut scene = MemoryScene::with_gcode(single_plate());
        let outcome = GcodeAnnotator::new().on_write_started(&resolver, &mut scene);

        assert_eq!(outcome, AnnotateOutcome::Skipped(SkipReason::StartGcodeHasCommand));
        assert_eq!(scene.plates().unwrap(), &single_plate());
        assert_eq!(scene.write_count(), 0);
    }

    #[test]
    fn test_mnemonic_requires_trailing_space() {
        let resolver = settings(true, 5.0).with_global(MACHINE_START_GCODE_KEY, "G28\nM4200\n");
        let mut scene = MemoryScene::with_gcode(single_plate());
        let outcome = GcodeAnnotator::new().on_write_started(&resolver, &mut scene);
        assert!(matches!(outcome, AnnotateOutcome::Processed { written: true, .. }));
    }

    #[test]
    fn test_partial_failure_isolation() {
        let mut plates = GcodePlateSet::new();
        plates.insert("A", blocks(&[";only header\n"]));
        plates.insert("B", blocks(&["", "G1 X0 Y0\n"]));
        let mut scene = MemoryScene::with_gcode(plates);

        let outcome = GcodeAnnotator::new().on_write_started(&settings(false, 2.0), &mut scene);
        let AnnotateOutcome::Processed { report, written, .. } = outcome else {
            panic!("expected plates to be processed");
        };
        assert!(written);
        assert_eq!(report.status(&PlateId::from("A")), Some(PlateStatus::NoLayers));
        assert_eq!(report.status(&PlateId::from("B")), Some(PlateStatus::Annotated));

        let stored = scene.plates().unwrap();
        assert_eq!(
            stored.get(&PlateId::from("A")).unwrap(),
            blocks(&[";only header\n"]).as_slice()
        );
        assert!(stored.is_processed(&PlateId::from("B")));
        assert_eq!(scene.write_count(), 1);
    }

    #[test]
    fn test_no_write_back_without_changes() {
        let mut plates = GcodePlateSet::new();
        plates.insert(
            0i64,
            blocks(&[PROCESSED_MARKER, "G1\nM420 S1 Z3 ;added by FadeHeightSettingPlugin\n"]),
        );
        plates.insert(1i64, blocks(&[""]));
        let mut scene = MemoryScene::with_gcode(plates.clone());

        let outcome = GcodeAnnotator::new().on_write_started(&settings(true, 3.0), &mut scene);
        assert!(matches!(outcome, AnnotateOutcome::Processed { written: false, .. }));
        assert_eq!(scene.write_count(), 0);
        assert_eq!(scene.plates().unwrap(), &plates);
    }

    #[test]
    fn test_multi_plate_only_new_plates_change() {
        let mut plates = GcodePlateSet::new();
        plates.insert(
            0i64,
            blocks(&[
                ";FLAVOR:Marlin\n;FADEHEIGHTPROCESSED\n",
                "G1\nM420 S1 Z3 ;added by FadeHeightSettingPlugin\n",
            ]),
        );
        plates.insert(1i64, blocks(&[";FLAVOR:Marlin\n", "G1\n", "G1 Z0.4\n"]));
        let before = plates.clone();
        let mut scene = MemoryScene::with_gcode(plates);

        GcodeAnnotator::new().on_write_started(&settings(true, 3.0), &mut scene);
        let after = scene.plates().unwrap();
        assert_eq!(after.get(&PlateId::Index(0)), before.get(&PlateId::Index(0)));
        let plate = after.get(&PlateId::Index(1)).unwrap();
        assert_eq!(plate[0], ";FLAVOR:Marlin\n;FADEHEIGHTPROCESSED\n");
        assert_eq!(plate[1], "G1\nM420 S1 Z3 ;added by FadeHeightSettingPlugin\n");
        assert_eq!(plate[2], "G1 Z0.4\n");
    }

    #[test]
    fn test_truncation_in_plate() {
        let mut plates = single_plate();
        let report =
            GcodeAnnotator::new().annotate_plates(&mut plates, &FadeHeightCommand::new(true, 3.99));
        assert!(report.changed());
        assert!(plates.get(&PlateId::Index(0)).unwrap()[1]
            .ends_with("M420 S1 Z3 ;added by FadeHeightSettingPlugin\n"));
    }

    #[test]
    fn test_preconditions() {
        let annotator = GcodeAnnotator::new();

        let mut scene = MemoryScene::with_gcode(single_plate());
        assert_eq!(
            annotator.on_write_started(&FixedSettings::new(), &mut scene),
            AnnotateOutcome::Skipped(SkipReason::NoMachine)
        );
        assert_eq!(
            annotator.on_write_started(&FixedSettings::machine(), &mut scene),
            AnnotateOutcome::Skipped(SkipReason::NoUsedExtruders)
        );
        assert_eq!(scene.write_count(), 0);

        let mut empty = MemoryScene::new();
        assert_eq!(
            annotator.on_write_started(&settings(true, 1.0), &mut empty),
            AnnotateOutcome::Skipped(SkipReason::NoGcode)
        );
        let mut no_plates = MemoryScene::with_gcode(GcodePlateSet::new());
        assert_eq!(
            annotator.on_write_started(&settings(true, 1.0), &mut no_plates),
            AnnotateOutcome::Skipped(SkipReason::NoGcode)
        );
        assert_eq!(no_plates.write_count(), 0);
    }

    #[test]
    fn test_only_missing_gcode_warns() {
        assert!(SkipReason::NoGcode.is_warning());
        for reason in [
            SkipReason::NoMachine,
            SkipReason::NoUsedExtruders,
            SkipReason::StartGcodeHasCommand,
            SkipReason::Inactive,
        ] {
            assert!(!reason.is_warning(), "{} should stay at debug", reason);
        }
    }

    #[test]
    fn test_missing_values_use_defaults() {
        let resolver = FixedSettings::machine().with_used_extruder(0);
        let command = GcodeAnnotator::new().resolve_command(&resolver);
        assert_eq!(command, FadeHeightCommand::new(false, 0.0));

        let mut scene = MemoryScene::with_gcode(single_plate());
        GcodeAnnotator::new().on_write_started(&resolver, &mut scene);
        let plate = scene.plates().unwrap().get(&PlateId::Index(0)).unwrap();
        assert!(plate[1].ends_with("M420 S0 Z0 ;added by FadeHeightSettingPlugin\n"));
    }

    #[test]
    fn test_always_injects_by_default() {
        let mut scene = MemoryScene::with_gcode(single_plate());
        let outcome = GcodeAnnotator::new().on_write_started(&settings(false, 0.0), &mut scene);
        assert!(matches!(outcome, AnnotateOutcome::Processed { written: true, .. }));
    }

    #[test]
    fn test_skip_when_inactive() {
        let annotator = GcodeAnnotator::new().with_skip_when_inactive(true);
        let mut scene = MemoryScene::with_gcode(single_plate());
        assert_eq!(
            annotator.on_write_started(&settings(false, 0.0), &mut scene),
            AnnotateOutcome::Skipped(SkipReason::Inactive)
        );
        assert_eq!(scene.write_count(), 0);

        let outcome = annotator.on_write_started(&settings(true, 0.0), &mut scene);
        assert!(matches!(outcome, AnnotateOutcome::Processed { written: true, .. }));
    }
}
