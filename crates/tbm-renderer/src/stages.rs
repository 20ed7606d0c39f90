use thiserror::Error;

/// One draw step of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Body,
    BackCap,
    FrontCap,
    CutterRing,
    Spokes,
    AxisLines,
    Hud,
}

/// Which part of the frame a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    /// 3D geometry, depth tested and depth written.
    Scene,
    /// Screen-space overlay, drawn without depth testing.
    Overlay,
}

impl Stage {
    pub fn layer(self) -> Layer {
        match self {
            Stage::Hud => Layer::Overlay,
            _ => Layer::Scene,
        }
    }

    pub fn depth_tested(self) -> bool {
        self.layer() == Layer::Scene
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Body => "body",
            Stage::BackCap => "back_cap",
            Stage::FrontCap => "front_cap",
            Stage::CutterRing => "cutter_ring",
            Stage::Spokes => "spokes",
            Stage::AxisLines => "axis_lines",
            Stage::Hud => "hud",
        }
    }
}

/// Draw order of every frame.
pub const FRAME_STAGES: [Stage; 7] = [
    Stage::Body,
    Stage::BackCap,
    Stage::FrontCap,
    Stage::CutterRing,
    Stage::Spokes,
    Stage::AxisLines,
    Stage::Hud,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageOrderError {
    #[error("Stage {0:?} appears more than once")]
    Duplicate(Stage),
    #[error("Scene stage {scene:?} is drawn after overlay stage {overlay:?}")]
    SceneAfterOverlay { scene: Stage, overlay: Stage },
    #[error("Axis lines must follow every opaque mesh stage, found {0:?} after them")]
    MeshAfterAxis(Stage),
}

/// Check a stage list against the frame contract: each stage at most once,
/// all scene stages before any overlay stage, axis lines after the meshes.
pub fn check_order(stages: &[Stage]) -> Result<(), StageOrderError> {
    let mut seen: Vec<Stage> = Vec::with_capacity(stages.len());
    let mut first_overlay = None;

    for &stage in stages {
        if seen.contains(&stage) {
            return Err(StageOrderError::Duplicate(stage));
        }
        match (stage.layer(), first_overlay) {
            (Layer::Overlay, None) => first_overlay = Some(stage),
            (Layer::Scene, Some(overlay)) => {
                return Err(StageOrderError::SceneAfterOverlay {
                    scene: stage,
                    overlay,
                })
            }
            _ => {}
        }
        if stage != Stage::AxisLines
            && stage.layer() == Layer::Scene
            && seen.contains(&Stage::AxisLines)
        {
            return Err(StageOrderError::MeshAfterAxis(stage));
        }
        seen.push(stage);
    }
    Ok(())
}

/// Stages of `stages` in the given layer, order preserved.
pub fn in_layer(stages: &[Stage], layer: Layer) -> impl Iterator<Item = Stage> + '_ {
    stages.iter().copied().filter(move |s| s.layer() == layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_order_is_valid() {
        assert_eq!(check_order(&FRAME_STAGES), Ok(()));
        assert_eq!(FRAME_STAGES.last(), Some(&Stage::Hud));
    }

    #[test]
    fn hud_is_the_only_untested_stage() {
        let untested: Vec<_> = FRAME_STAGES.iter().filter(|s| !s.depth_tested()).collect();
        assert_eq!(untested, vec![&Stage::Hud]);
    }

    #[test]
    fn overlay_before_scene_is_rejected() {
        let order = [Stage::Body, Stage::Hud, Stage::Spokes];
        assert_eq!(
            check_order(&order),
            Err(StageOrderError::SceneAfterOverlay {
                scene: Stage::Spokes,
                overlay: Stage::Hud
            })
        );
    }

    #[test]
    fn mesh_after_axis_is_rejected() {
        let order = [Stage::Body, Stage::AxisLines, Stage::Spokes, Stage::Hud];
        assert_eq!(
            check_order(&order),
            Err(StageOrderError::MeshAfterAxis(Stage::Spokes))
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let order = [Stage::Body, Stage::Body];
        assert_eq!(check_order(&order), Err(StageOrderError::Duplicate(Stage::Body)));
    }

    #[test]
    fn layers_split_preserving_order() {
        let scene: Vec<_> = in_layer(&FRAME_STAGES, Layer::Scene).collect();
        assert_eq!(scene.len(), 6);
        assert_eq!(scene[0], Stage::Body);
        assert_eq!(scene[5], Stage::AxisLines);
        let overlay: Vec<_> = in_layer(&FRAME_STAGES, Layer::Overlay).collect();
        assert_eq!(overlay, vec![Stage::Hud]);
    }
}
