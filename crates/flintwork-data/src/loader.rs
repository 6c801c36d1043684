//! Resolution pipeline: reads definition files, resolves names, builds a
//! [`Workbench`] on a [`HeadlessScene`].
//!
//! Provides format detection (RON/JSON/TOML) and deserialization helpers, and
//! registers flakes and attach points in dependency order so that authors can
//! list them in any order.

use crate::schema::{AttachPointData, BlankData, HaftData, WorkbenchData};
use flintwork_core::capability::AdhesivePart;
use flintwork_core::hafting::{
    AttachPointConfig, AttachTarget, HaftingError, HaftingModule, HandleConfig,
};
use flintwork_core::id::{AttachPointId, ColliderId, FlakeId, HandleId, ObjectiveId, PrefabId};
use flintwork_core::knapping::{FlakeConfig, KnappingError, KnappingModule, ObjectiveConfig};
use flintwork_core::scene::HeadlessScene;
use flintwork_core::workbench::Workbench;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {scope}")]
    UnresolvedRef {
        scope: String,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName { scope: String, name: String },

    /// Dependencies that can never be satisfied.
    #[error("dependency cycle in {scope} through {names:?}")]
    DependencyCycle { scope: String, names: Vec<String> },

    /// An attach point names a target type the core does not know.
    #[error("attach point '{point}' in {scope}: {source}")]
    UnknownTarget {
        scope: String,
        point: String,
        source: HaftingError,
    },

    /// A replay step asks for more ticks than one step may advance.
    #[error("replay step {step} advances {ticks} ticks, more than the limit of {limit}")]
    StepTooLong { step: usize, ticks: u64, limit: u64 },

    #[error(transparent)]
    Knapping(#[from] KnappingError),

    #[error(transparent)]
    Hafting(#[from] HaftingError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `origin` is only used for
/// error messages.
pub fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format, path)
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    scope: &str,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        scope: scope.to_string(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    scope: &str,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            scope: scope.to_string(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Order entries so that each comes after everything it depends on (Kahn's
/// algorithm). Ties keep authored order.
///
/// Fails on duplicate names, unknown dependency names, and cycles.
pub fn registration_order<T>(
    items: &[T],
    scope: &str,
    expected_kind: &'static str,
    name: impl Fn(&T) -> &str,
    dependencies: impl Fn(&T) -> &[String],
) -> Result<Vec<usize>, DataLoadError> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        check_duplicate(&index, name(item), scope)?;
        index.insert(name(item).to_string(), i);
    }

    let mut in_degree = vec![0usize; items.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for (i, item) in items.iter().enumerate() {
        for dependency in dependencies(item) {
            let &d = resolve_name(&index, dependency, scope, expected_kind)?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..items.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(items.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < items.len() {
        let names = (0..items.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| name(&items[i]).to_string())
            .collect();
        return Err(DataLoadError::DependencyCycle {
            scope: scope.to_string(),
            names,
        });
    }
    Ok(order)
}

// ===========================================================================
// Loaded workbench
// ===========================================================================

/// Name index for one loaded blank.
#[derive(Debug, Clone)]
pub struct LoadedBlank {
    pub objective: ObjectiveId,
    pub flakes: HashMap<String, FlakeId>,
}

/// Name index for one loaded haft.
#[derive(Debug, Clone)]
pub struct LoadedHaft {
    pub handle: HandleId,
    pub attach_points: HashMap<String, AttachPointId>,
}

/// A built workbench, the scene it lives in, and name indexes into both.
#[derive(Debug)]
pub struct LoadedWorkbench {
    pub workbench: Workbench,
    pub scene: HeadlessScene,
    pub blanks: HashMap<String, LoadedBlank>,
    pub hafts: HashMap<String, LoadedHaft>,
    pub adhesives: HashMap<String, AdhesivePart>,
}

impl LoadedWorkbench {
    /// The objective built for a blank.
    pub fn objective(&self, blank: &str) -> Result<ObjectiveId, DataLoadError> {
        Ok(resolve_name(&self.blanks, blank, "workbench", "blank")?.objective)
    }

    /// A flake of a blank, by name.
    pub fn flake(&self, blank: &str, flake: &str) -> Result<FlakeId, DataLoadError> {
        let loaded = resolve_name(&self.blanks, blank, "workbench", "blank")?;
        resolve_name(&loaded.flakes, flake, &format!("blank '{blank}'"), "flake").copied()
    }

    /// The handle built for a haft.
    pub fn handle(&self, haft: &str) -> Result<HandleId, DataLoadError> {
        Ok(resolve_name(&self.hafts, haft, "workbench", "haft")?.handle)
    }

    /// An attach point of a haft, by name.
    pub fn attach_point(&self, haft: &str, point: &str) -> Result<AttachPointId, DataLoadError> {
        let loaded = resolve_name(&self.hafts, haft, "workbench", "haft")?;
        resolve_name(
            &loaded.attach_points,
            point,
            &format!("haft '{haft}'"),
            "attach point",
        )
        .copied()
    }

    /// A loose adhesive lump, by name.
    pub fn adhesive(&self, name: &str) -> Result<AdhesivePart, DataLoadError> {
        resolve_name(&self.adhesives, name, "workbench", "adhesive").copied()
    }
}

// ===========================================================================
// Building
// ===========================================================================

/// Load a workbench definition from a RON, JSON, or TOML file.
pub fn load_workbench(path: &Path) -> Result<LoadedWorkbench, DataLoadError> {
    let data: WorkbenchData = deserialize_file(path)?;
    build_workbench(&data)
}

/// Build a workbench and its headless scene from parsed data.
///
/// Attach point targets are checked before anything is built, so an unknown
/// tag fails the load without side effects.
pub fn build_workbench(data: &WorkbenchData) -> Result<LoadedWorkbench, DataLoadError> {
    let mut targets: Vec<Vec<AttachTarget>> = Vec::with_capacity(data.hafts.len());
    for haft in &data.hafts {
        let scope = format!("haft '{}'", haft.name);
        let parsed = haft
            .attach_points
            .iter()
            .map(|point| {
                point
                    .target
                    .parse::<AttachTarget>()
                    .map_err(|source| DataLoadError::UnknownTarget {
                        scope: scope.clone(),
                        point: point.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        targets.push(parsed);
    }

    let mut scene = HeadlessScene::new();
    let mut knapping = KnappingModule::new();
    let mut hafting = HaftingModule::new();

    let mut blanks = HashMap::new();
    for blank in &data.blanks {
        check_duplicate(&blanks, &blank.name, "workbench")?;
        let loaded = build_blank(blank, &mut knapping, &mut scene)?;
        blanks.insert(blank.name.clone(), loaded);
    }

    let mut hafts = HashMap::new();
    for (haft, targets) in data.hafts.iter().zip(&targets) {
        check_duplicate(&hafts, &haft.name, "workbench")?;
        let loaded = build_haft(haft, targets, &mut hafting, &mut scene)?;
        hafts.insert(haft.name.clone(), loaded);
    }

    let mut adhesives = HashMap::new();
    for adhesive in &data.adhesives {
        check_duplicate(&adhesives, &adhesive.name, "workbench")?;
        let node = scene.spawn(&adhesive.name, adhesive.pose.to_pose());
        adhesives.insert(adhesive.name.clone(), AdhesivePart { node });
    }

    tracing::info!(
        blanks = blanks.len(),
        hafts = hafts.len(),
        adhesives = adhesives.len(),
        "workbench loaded"
    );

    Ok(LoadedWorkbench {
        workbench: Workbench::from_parts(knapping, hafting),
        scene,
        blanks,
        hafts,
        adhesives,
    })
}

fn build_blank(
    blank: &BlankData,
    knapping: &mut KnappingModule,
    scene: &mut HeadlessScene,
) -> Result<LoadedBlank, DataLoadError> {
    let scope = format!("blank '{}'", blank.name);
    let order = registration_order(
        &blank.flakes,
        &scope,
        "flake",
        |flake| flake.name.as_str(),
        |flake| flake.dependencies.as_slice(),
    )?;

    let blank_pose = blank.pose.to_pose();
    let blank_node = scene.spawn(&blank.name, blank_pose);
    let objective = knapping.create_objective(ObjectiveConfig {
        name: blank.name.clone(),
        node: blank_node,
        interactable_prefab: PrefabId(blank.interactable_prefab),
        detach_cooldown: blank.detach_cooldown,
    });

    let mut flakes: HashMap<String, FlakeId> = HashMap::with_capacity(order.len());
    for i in order {
        let flake = &blank.flakes[i];
        let node = scene.spawn_child(blank_node, &flake.name, blank_pose.compose(flake.pose.to_pose()));
        let colliders: Vec<ColliderId> = flake.colliders.iter().map(|&c| ColliderId(c)).collect();
        for &collider in &colliders {
            scene.add_collider(blank_node, collider);
        }
        let dependencies = flake
            .dependencies
            .iter()
            .map(|dep| resolve_name(&flakes, dep, &scope, "flake").copied())
            .collect::<Result<Vec<_>, _>>()?;

        let id = knapping.add_flake(
            objective,
            FlakeConfig {
                name: flake.name.clone(),
                node,
                colliders,
                offset_directions: flake.offset_directions.clone(),
                thresholds: flake.thresholds(),
                attachable: flake.attachable,
                attach_direction: flake.attach_direction,
                dependencies,
            },
        )?;
        flakes.insert(flake.name.clone(), id);
    }

    for flake in &blank.flakes {
        if let Some(twin) = &flake.adjacent {
            let a = *resolve_name(&flakes, &flake.name, &scope, "flake")?;
            let b = *resolve_name(&flakes, twin, &scope, "flake")?;
            knapping.link_adjacent(a, b)?;
        }
    }

    tracing::debug!(blank = %blank.name, flakes = flakes.len(), "blank built");
    Ok(LoadedBlank { objective, flakes })
}

fn build_haft(
    haft: &HaftData,
    targets: &[AttachTarget],
    hafting: &mut HaftingModule,
    scene: &mut HeadlessScene,
) -> Result<LoadedHaft, DataLoadError> {
    let scope = format!("haft '{}'", haft.name);
    let order = registration_order(
        &haft.attach_points,
        &scope,
        "attach point",
        |point: &AttachPointData| point.name.as_str(),
        |point: &AttachPointData| point.dependencies.as_slice(),
    )?;

    let haft_pose = haft.pose.to_pose();
    let haft_node = scene.spawn(&haft.name, haft_pose);
    let handle = hafting.create_handle(HandleConfig::new(haft.name.clone(), haft_node));

    let mut attach_points: HashMap<String, AttachPointId> = HashMap::with_capacity(order.len());
    for i in order {
        let point = &haft.attach_points[i];
        let point_pose = haft_pose.compose(point.pose.to_pose());
        let node = scene.spawn_child(haft_node, &point.name, point_pose);
        let attach_transform = point.attach_offset.map(|offset| {
            scene.spawn_child(
                node,
                &format!("{}_attach", point.name),
                point_pose.compose(offset.to_pose()),
            )
        });
        let triggers: Vec<ColliderId> = point.triggers.iter().map(|&c| ColliderId(c)).collect();
        for &trigger in &triggers {
            scene.add_collider(haft_node, trigger);
        }
        let dependencies = point
            .dependencies
            .iter()
            .map(|dep| resolve_name(&attach_points, dep, &scope, "attach point").copied())
            .collect::<Result<Vec<_>, _>>()?;

        let id = hafting.add_attach_point(
            handle,
            AttachPointConfig {
                name: point.name.clone(),
                node,
                attach_transform,
                target: targets[i],
                triggers,
                dependencies,
            },
            scene,
        )?;
        attach_points.insert(point.name.clone(), id);
    }

    tracing::debug!(haft = %haft.name, attach_points = attach_points.len(), "haft built");
    Ok(LoadedHaft {
        handle,
        attach_points,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReplayScript;
    use flintwork_core::scene::SceneMutator;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "flintwork_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const SPEAR_RON: &str = r#"(
        blanks: [(
            name: "core",
            detach_cooldown: 0,
            flakes: [
                (name: "point", offset_directions: [(0.0, 0.0, 1.0)], attachable: true, dependencies: ["cortex"]),
                (name: "cortex", offset_directions: [(0.0, 0.0, 1.0)], colliders: [1, 2]),
                (name: "left", offset_directions: [(1.0, 0.0, 0.0)], adjacent: Some("right")),
                (name: "right", offset_directions: [(-1.0, 0.0, 0.0)]),
            ],
        )],
        hafts: [(
            name: "spear",
            attach_points: [
                (name: "tip", target: "flake", dependencies: ["glue"], attach_offset: Some((position: (0.0, 1.0, 0.0)))),
                (name: "glue", target: "adhesive", triggers: [10]),
            ],
        )],
        adhesives: [(name: "pitch")],
    )"#;

    fn spear() -> LoadedWorkbench {
        let data: WorkbenchData = parse_str(SPEAR_RON, Format::Ron, Path::new("spear.ron")).unwrap();
        build_workbench(&data).unwrap()
    }

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("bench.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("bench.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("bench.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("bench.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("bench")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn flakes_register_after_their_dependencies() {
        let loaded = spear();
        let point = loaded.flake("core", "point").unwrap();
        let cortex = loaded.flake("core", "cortex").unwrap();
        assert_eq!(loaded.workbench.knapping.dependencies(point), vec![cortex]);
        assert!(!loaded.workbench.knapping.is_ready(point));
        assert_eq!(
            loaded.workbench.knapping.flake_for_collider(ColliderId(2)),
            Some(cortex)
        );
    }

    #[test]
    fn adjacency_is_linked_both_ways() {
        let loaded = spear();
        let left = loaded.flake("core", "left").unwrap();
        let right = loaded.flake("core", "right").unwrap();
        assert_eq!(loaded.workbench.knapping.flake(left).unwrap().adjacent(), Some(right));
        assert_eq!(loaded.workbench.knapping.flake(right).unwrap().adjacent(), Some(left));
    }

    #[test]
    fn blocked_attach_point_starts_inactive() {
        let loaded = spear();
        let tip = loaded.attach_point("spear", "tip").unwrap();
        let glue = loaded.attach_point("spear", "glue").unwrap();
        let hafting = &loaded.workbench.hafting;
        let tip_point = hafting.attach_point(tip).unwrap();
        assert!(!loaded.scene.node(tip_point.node()).unwrap().active);
        assert_ne!(tip_point.attach_transform(), tip_point.node());
        assert_eq!(
            loaded.scene.world_pose(tip_point.attach_transform()).position,
            glam::Vec3::Y
        );
        assert_eq!(hafting.point_for_trigger(ColliderId(10)), Some(glue));
        assert!(loaded.adhesive("pitch").is_ok());
    }

    #[test]
    fn unknown_target_fails_fast() {
        let data: WorkbenchData = parse_str(
            r#"(hafts: [(name: "spear", attach_points: [(name: "tip", target: "sinew")])])"#,
            Format::Ron,
            Path::new("bad.ron"),
        )
        .unwrap();
        let err = build_workbench(&data).unwrap_err();
        assert!(matches!(
            &err,
            DataLoadError::UnknownTarget { point, source: HaftingError::UnknownTarget(tag), .. }
                if point == "tip" && tag == "sinew"
        ));
        assert!(err.to_string().contains("sinew"));
    }

    #[test]
    fn dependency_cycle_is_reported() {
        let data: WorkbenchData = parse_str(
            r#"{"blanks": [{"name": "core", "flakes": [
                {"name": "a", "dependencies": ["b"]},
                {"name": "b", "dependencies": ["a"]},
                {"name": "c"}
            ]}]}"#,
            Format::Json,
            Path::new("cycle.json"),
        )
        .unwrap();
        match build_workbench(&data) {
            Err(DataLoadError::DependencyCycle { names, .. }) => {
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_and_duplicate_names() {
        let unknown: WorkbenchData = parse_str(
            r#"(blanks: [(name: "core", flakes: [(name: "a", dependencies: ["ghost"])])])"#,
            Format::Ron,
            Path::new("unknown.ron"),
        )
        .unwrap();
        assert!(matches!(
            build_workbench(&unknown),
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "flake", .. }) if name == "ghost"
        ));

        let duplicate: WorkbenchData = parse_str(
            r#"(blanks: [(name: "core", flakes: [(name: "a"), (name: "a")])])"#,
            Format::Ron,
            Path::new("dup.ron"),
        )
        .unwrap();
        assert!(matches!(
            build_workbench(&duplicate),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "a"
        ));
    }

    #[test]
    fn core_validation_errors_surface() {
        let data: WorkbenchData = parse_str(
            r#"(blanks: [(name: "core", flakes: [(name: "a", removal_ratio: 2.0)])])"#,
            Format::Ron,
            Path::new("ratio.ron"),
        )
        .unwrap();
        assert!(matches!(
            build_workbench(&data),
            Err(DataLoadError::Knapping(KnappingError::Thresholds { .. }))
        ));
    }

    #[test]
    fn load_toml_file() {
        let dir = make_test_dir("toml");
        let path = dir.join("bench.toml");
        fs::write(
            &path,
            r#"
[[blanks]]
name = "core"
detach_cooldown = 2

[[blanks.flakes]]
name = "tip"
offset_directions = [[0.0, 0.0, 1.0]]
min_force = 10.0
"#,
        )
        .unwrap();

        let loaded = load_workbench(&path).unwrap();
        let tip = loaded.flake("core", "tip").unwrap();
        let flake = loaded.workbench.knapping.flake(tip).unwrap();
        assert_eq!(flake.thresholds().min_force, 10.0);
        assert_eq!(flake.thresholds().max_angle, 20.0);
        let objective = loaded.objective("core").unwrap();
        assert_eq!(
            loaded.workbench.knapping.objective(objective).unwrap().detach_cooldown(),
            2
        );

        cleanup(&dir);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("bad.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<ReplayScript, _> = deserialize_file(&path);
        match result {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }

        cleanup(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result: Result<WorkbenchData, _> =
            deserialize_file(Path::new("/nonexistent/flintwork/bench.ron"));
        assert!(matches!(result, Err(DataLoadError::Io(_))));
    }
}
