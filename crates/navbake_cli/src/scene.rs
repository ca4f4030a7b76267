//! Loading of OBJ scenes into the bake input.

use std::path::Path;

use anyhow::{Context as _, bail};
use glam::{UVec3, Vec3A};
use navbake::TriMesh;

use crate::settings::BakeSettings;

/// Loads every object of an OBJ file into a single trimesh.
///
/// Each object is tagged with the area type the settings assign to its name.
pub fn load_scene(path: &Path, settings: &BakeSettings) -> anyhow::Result<TriMesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("Failed to load scene {}", path.display()))?;

    let mut scene = TriMesh::default();
    for model in models {
        let mesh = model.mesh;
        let vertices = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3A::new(p[0], p[1], p[2]))
            .collect();
        let indices = mesh
            .indices
            .chunks_exact(3)
            .map(|i| UVec3::new(i[0], i[1], i[2]))
            .collect();
        let area = settings.area_of(&model.name);
        let object = TriMesh::with_area(vertices, indices, area);
        tracing::debug!(
            "Object `{}`: {} triangles, area {:?}",
            model.name,
            object.triangle_count(),
            area
        );
        scene.extend(object);
    }
    if scene.triangle_count() == 0 {
        bail!("Scene {} contains no triangles", path.display());
    }
    tracing::info!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        scene.vertices.len(),
        scene.triangle_count()
    );
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use navbake::AreaType;

    use super::*;
    use crate::test_support::{TempDir, fixture};

    #[test]
    fn loads_every_object() {
        let settings = BakeSettings::parse(r#"{ "areas": { "Bridge": 4 } }"#).unwrap();
        let scene = load_scene(&fixture("bridge.obj"), &settings).unwrap();
        // Two quads, each split into two triangles.
        assert_eq!(scene.triangle_count(), 4);
        assert_eq!(
            scene.area_types,
            vec![
                AreaType::WALKABLE,
                AreaType::WALKABLE,
                AreaType::GRASS,
                AreaType::GRASS
            ]
        );
        let aabb = scene.compute_aabb().unwrap();
        assert_eq!(aabb.min, Vec3A::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3A::new(10.0, 3.0, 10.0));
    }

    #[test]
    fn empty_scene_is_an_error() {
        let dir = TempDir::new("empty-scene");
        let path = dir.path().join("empty.obj");
        std::fs::write(&path, "o Nothing\n").unwrap();
        assert!(load_scene(&path, &BakeSettings::default()).is_err());
    }

    #[test]
    fn missing_scene_is_an_error() {
        let error = load_scene(Path::new("does/not/exist.obj"), &BakeSettings::default())
            .unwrap_err();
        assert!(format!("{error:#}").contains("exist.obj"));
    }
}
