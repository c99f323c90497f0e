//! Text scene-description loading.
//!
//! The format is line oriented: `#` starts a comment, a block opens with a
//! keyword followed by `{` on the same line, and ends at a line containing
//! `}`. Inside a block, keyed lines (`position 0 1 2`, `radius 4`) are
//! matched tolerantly and case-sensitively; unknown lines are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::Arc;

use lumen_math::{Mat4, Vec3};
use thiserror::Error;

use crate::camera::Camera;
use crate::material::{Material, MaterialHandle};
use crate::scene::Scene;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type MaterialMap = HashMap<String, MaterialHandle>;
type LineSource = Lines<BufReader<File>>;

/// Value after a keyed prefix, e.g. `scan_key("radius 4", "radius")`.
/// The key must be followed by whitespace to match.
fn scan_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(key)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// First whitespace-delimited token after the key.
fn scan_string(line: &str, key: &str) -> Option<String> {
    scan_key(line, key)?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

fn scan_f32(line: &str, key: &str) -> Option<f32> {
    scan_key(line, key)?.split_whitespace().next()?.parse().ok()
}

fn scan_i32(line: &str, key: &str) -> Option<i32> {
    scan_key(line, key)?.split_whitespace().next()?.parse().ok()
}

fn scan_floats<const N: usize>(line: &str, key: &str) -> Option<[f32; N]> {
    let mut tokens = scan_key(line, key)?.split_whitespace();
    let mut out = [0.0f32; N];
    for value in &mut out {
        *value = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

fn scan_vec3(line: &str, key: &str) -> Option<Vec3> {
    scan_floats::<3>(line, key).map(|[x, y, z]| Vec3::new(x, y, z))
}

/// `rotation ax ay az angle` — an axis and an angle in degrees.
fn scan_rotation(line: &str) -> Option<(Vec3, f32)> {
    scan_floats::<4>(line, "rotation").map(|[x, y, z, w]| (Vec3::new(x, y, z), w))
}

/// Drain a block's lines, feeding each to `visit`, until the closing brace.
fn each_block_line(lines: &mut LineSource, mut visit: impl FnMut(&str)) -> std::io::Result<()> {
    for line in lines.by_ref() {
        let line = line?;
        if line.contains('}') {
            break;
        }
        visit(&line);
    }
    Ok(())
}

fn parse_material(
    material_name: &str,
    lines: &mut LineSource,
    materials: &mut MaterialMap,
) -> std::io::Result<()> {
    let mut color = Vec3::ZERO;
    let mut emission = Vec3::ZERO;
    let mut metallic = 0.0f32;
    let mut roughness = 0.0f32;
    let mut refraction_index = 1.0f32;
    let mut texture_scale = 1.0f32;
    let mut brdf = 0i32;
    let mut frostiness = 0.0f32;
    let mut reflectivity = 0.1f32;
    let mut texture_name = String::new();

    each_block_line(lines, |line| {
        if let Some(v) = scan_vec3(line, "color") {
            color = v;
        }
        if let Some(v) = scan_vec3(line, "emission") {
            emission = v;
        }
        if let Some(v) = scan_f32(line, "metallic") {
            metallic = v;
        }
        if let Some(v) = scan_f32(line, "roughness") {
            roughness = v;
        }
        if let Some(v) = scan_f32(line, "index") {
            refraction_index = v;
        }
        if let Some(v) = scan_string(line, "texture") {
            texture_name = v;
        }
        if let Some(v) = scan_f32(line, "texture_scale") {
            texture_scale = v;
        }
        if let Some(v) = scan_i32(line, "brdf") {
            brdf = v;
        }
        if let Some(v) = scan_f32(line, "frostiness") {
            frostiness = v;
        }
        if let Some(v) = scan_f32(line, "reflectivity") {
            reflectivity = v;
        }
    })?;

    let mut material = if emission != Vec3::ZERO {
        Material::light(emission)
    } else if roughness != 0.0 {
        Material::ceramic(color, roughness)
    } else if metallic != 0.0 {
        if metallic == 1.0 {
            Material::mirror(color)
        } else {
            Material::metal(color, metallic)
        }
    } else if brdf == 1 {
        Material::liquid(color, refraction_index, reflectivity)
    } else if brdf == 2 {
        Material::glass(color, refraction_index, reflectivity, frostiness)
    } else {
        Material::diffuse(color)
    };

    if !texture_name.is_empty() && texture_name != "None" {
        material.load_diffuse_texture(&texture_name, texture_scale);
    }

    materials.insert(material_name.to_string(), Arc::new(material));
    Ok(())
}

fn parse_sphere(
    lines: &mut LineSource,
    scene: &mut Scene,
    materials: &MaterialMap,
) -> std::io::Result<()> {
    let mut material_name = String::new();
    let mut position = Vec3::ZERO;
    let mut radius = 0.0f32;

    each_block_line(lines, |line| {
        if let Some(v) = scan_string(line, "material") {
            material_name = v;
        }
        if let Some(v) = scan_vec3(line, "position") {
            position = v;
        }
        if let Some(v) = scan_f32(line, "radius") {
            radius = v;
        }
    })?;

    let object = scene.add_spherical_object(position, radius);
    if let Some(material) = materials.get(&material_name) {
        object.set_material(material.clone());
    }
    Ok(())
}

fn parse_camera(lines: &mut LineSource, scene: &mut Scene) -> std::io::Result<()> {
    let mut camera = Camera::default();

    each_block_line(lines, |line| {
        if let Some(v) = scan_vec3(line, "position") {
            camera.origin = v;
        }
        if let Some(v) = scan_vec3(line, "target") {
            camera.target = v;
        }
        if let Some(v) = scan_f32(line, "fov") {
            camera.fov_y = v;
        }
        if let Some(v) = scan_f32(line, "aperture") {
            camera.aperture_size = v;
        }
        if let Some(v) = scan_f32(line, "focal_depth") {
            camera.focal_depth = v;
        }
    })?;

    scene.add_camera(camera);
    Ok(())
}

fn parse_sky(
    lines: &mut LineSource,
    scene: &mut Scene,
    materials: &MaterialMap,
) -> std::io::Result<()> {
    let mut material_name = String::new();
    each_block_line(lines, |line| {
        if let Some(v) = scan_string(line, "material") {
            material_name = v;
        }
    })?;

    if let Some(material) = materials.get(&material_name) {
        if !material.is_light() {
            log::warn!("Sky material {} is not a light material.", material_name);
        }
        scene.set_sky_material(material.clone());
    }
    Ok(())
}

fn parse_quad(
    lines: &mut LineSource,
    scene: &mut Scene,
    materials: &MaterialMap,
) -> std::io::Result<()> {
    let mut material_name = String::new();
    let mut position = Vec3::ZERO;
    let mut normal = Vec3::ZERO;
    let mut width = 0.0f32;
    let mut height = 0.0f32;

    each_block_line(lines, |line| {
        if let Some(v) = scan_string(line, "material") {
            material_name = v;
        }
        if let Some(v) = scan_vec3(line, "position") {
            position = v;
        }
        if let Some(v) = scan_vec3(line, "normal") {
            normal = v;
        }
        if let Some(v) = scan_f32(line, "width") {
            width = v;
        }
        if let Some(v) = scan_f32(line, "height") {
            height = v;
        }
    })?;

    let object = scene.add_quad_object(position, normal, width, height);
    if let Some(material) = materials.get(&material_name) {
        object.set_material(material.clone());
    }
    Ok(())
}

fn parse_cuboid(
    lines: &mut LineSource,
    scene: &mut Scene,
    materials: &MaterialMap,
) -> std::io::Result<()> {
    let mut material_name = String::new();
    let mut position = Vec3::ZERO;
    let mut width = 0.0f32;
    let mut height = 0.0f32;
    let mut depth = 0.0f32;
    let mut rotation = (Vec3::ZERO, 0.0f32);

    each_block_line(lines, |line| {
        if let Some(v) = scan_string(line, "material") {
            material_name = v;
        }
        if let Some(v) = scan_vec3(line, "position") {
            position = v;
        }
        if let Some(v) = scan_f32(line, "width") {
            width = v;
        }
        if let Some(v) = scan_f32(line, "height") {
            height = v;
        }
        if let Some(v) = scan_f32(line, "depth") {
            depth = v;
        }
        if let Some(v) = scan_rotation(line) {
            rotation = v;
        }
    })?;

    let object = scene.add_cuboid_object(position, width, height, depth);
    if let Some(material) = materials.get(&material_name) {
        object.set_material(material.clone());
    }
    let (axis, angle) = rotation;
    if axis != Vec3::ZERO {
        if let crate::object::Shape::Cuboid(cuboid) = object.shape_mut() {
            cuboid.rotate(axis, angle.to_radians());
        }
    }
    Ok(())
}

fn parse_mesh(
    lines: &mut LineSource,
    scene: &mut Scene,
    materials: &MaterialMap,
) -> std::io::Result<()> {
    let mut mesh_filename = String::new();
    let mut material_name = String::new();
    let mut translation = Vec3::ZERO;
    let mut scale = Vec3::ONE;
    let mut rotation = (Vec3::ZERO, 0.0f32);

    each_block_line(lines, |line| {
        if let Some(v) = scan_string(line, "file") {
            mesh_filename = v;
        }
        if let Some(v) = scan_string(line, "material") {
            material_name = v;
        }
        if let Some(v) = scan_vec3(line, "translation") {
            translation = v;
        }
        if let Some(v) = scan_vec3(line, "scale") {
            scale = v;
        }
        if let Some(v) = scan_rotation(line) {
            rotation = v;
        }
    })?;

    if mesh_filename.is_empty() {
        return Ok(());
    }

    let (axis, angle) = rotation;
    let rotation_matrix = if axis != Vec3::ZERO {
        Mat4::from_axis_angle(axis.normalize(), angle.to_radians())
    } else {
        Mat4::IDENTITY
    };
    let transform =
        Mat4::from_translation(translation) * rotation_matrix * Mat4::from_scale(scale);

    let object = scene.add_mesh_object(&mesh_filename, false, transform);
    if let Some(material) = materials.get(&material_name) {
        object.set_material(material.clone());
    }
    Ok(())
}

/// Load a scene description file.
pub fn load_scene(path: impl AsRef<Path>) -> Result<Scene, SceneError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let mut scene = Scene::new();
    let mut materials = MaterialMap::new();

    while let Some(line) = lines.next() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }

        if let Some(name) = scan_string(&line, "material") {
            parse_material(&name, &mut lines, &mut materials)?;
        } else if line.contains("sphere") {
            parse_sphere(&mut lines, &mut scene, &materials)?;
        } else if line.contains("camera") {
            parse_camera(&mut lines, &mut scene)?;
        } else if line.contains("sky") {
            parse_sky(&mut lines, &mut scene, &materials)?;
        } else if line.contains("quad") {
            parse_quad(&mut lines, &mut scene, &materials)?;
        } else if line.contains("cuboid") {
            parse_cuboid(&mut lines, &mut scene, &materials)?;
        } else if line.contains("mesh") {
            parse_mesh(&mut lines, &mut scene, &materials)?;
        }
    }

    scene.optimize();

    log::info!("Scene file {} loaded successfully.", path.display());

    Ok(scene)
}
