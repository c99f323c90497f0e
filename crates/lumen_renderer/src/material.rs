//! Reflectance models.
//!
//! Materials are a flat enum over the reflectance model, sharing a common
//! diffuse base (color, optional texture map, tiling scale). The contract
//! driving the integrator is three calls: `reflection` yields the bounce
//! direction, `will_use_indirect_light` decides whether that bounce is worth
//! tracing, and `sample` folds the traced result into an outgoing color.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use lumen_core::Texture;
use lumen_math::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::sampling::reflection_table;

/// Below this incident-light alignment a diffuse bounce contributes nothing.
const DIFFUSE_CONTRIB_THRESHOLD: f32 = 0.001;

/// Metals rougher than this behave like diffuse surfaces for gating.
const DIFFUSE_ROUGHNESS_THRESHOLD: f32 = 0.95;

pub type MaterialHandle = Arc<Material>;

/// Process-unique material ids with a randomized appearance. Stepping by an
/// odd constant walks the full 32-bit cycle, so ids cannot repeat in a run.
fn next_material_id() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU32::new(rand::random::<u32>()));
    counter.fetch_add(0x9E37_79B9, Ordering::Relaxed)
}

/// Inputs to a material's `sample` call, gathered by the integrator.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    /// Recursion depth of the bounce being shaded.
    pub depth: u32,
    /// World position of the surface point being shaded.
    pub sample_pos: Vec3,
    /// Origin of the incoming ray.
    pub view_pos: Vec3,
    /// Unit direction from the ray origin to the surface point.
    pub view_dir: Vec3,
    /// World position the indirect contribution arrived from.
    pub light_pos: Vec3,
    /// Direction the indirect bounce left the surface in.
    pub light_dir: Vec3,
    /// Color carried back by the indirect bounce.
    pub light_color: Vec3,
    /// Surface normal, already oriented against the incoming ray.
    pub normal: Vec3,
    /// Interpolated texture coordinates at the surface point.
    pub texcoords: Vec2,
    /// True if the ray struck the surface from inside the volume.
    pub is_internal: bool,
}

/// The reflectance model of a material.
#[derive(Debug, Clone)]
pub enum Reflectance {
    Diffuse,
    Light { emissive: Vec3 },
    Metal { roughness: f32 },
    Mirror,
    Glass { index: f32, reflectivity: f32, frost: f32 },
    Liquid { index: f32, reflectivity: f32 },
    Ceramic { shininess: f32 },
    Glow { shininess: f32, glow: Vec3 },
    Fog { density: f32 },
}

/// A shadeable material instance.
#[derive(Debug, Clone)]
pub struct Material {
    id: u32,
    diffuse: Vec3,
    diffuse_map: Option<Texture>,
    texture_scale: f32,
    model: Reflectance,
}

impl Material {
    fn with_model(diffuse: Vec3, model: Reflectance) -> Material {
        Material {
            id: next_material_id(),
            diffuse,
            diffuse_map: None,
            texture_scale: 1.0,
            model,
        }
    }

    pub fn diffuse(color: Vec3) -> Material {
        Self::with_model(color, Reflectance::Diffuse)
    }

    /// An emissive material. The diffuse base is white so a texture map can
    /// replace the emission wholesale.
    pub fn light(emissive: Vec3) -> Material {
        Self::with_model(Vec3::ONE, Reflectance::Light { emissive })
    }

    pub fn metal(color: Vec3, roughness: f32) -> Material {
        Self::with_model(color, Reflectance::Metal { roughness })
    }

    pub fn mirror(color: Vec3) -> Material {
        Self::with_model(color, Reflectance::Mirror)
    }

    pub fn glass(color: Vec3, index: f32, reflectivity: f32, frost: f32) -> Material {
        Self::with_model(
            color,
            Reflectance::Glass {
                index,
                reflectivity,
                frost,
            },
        )
    }

    pub fn liquid(color: Vec3, index: f32, reflectivity: f32) -> Material {
        Self::with_model(color, Reflectance::Liquid {
            index,
            reflectivity,
        })
    }

    pub fn ceramic(color: Vec3, shininess: f32) -> Material {
        Self::with_model(color, Reflectance::Ceramic { shininess })
    }

    pub fn glow(color: Vec3, glow: Vec3, shininess: f32) -> Material {
        Self::with_model(color, Reflectance::Glow { shininess, glow })
    }

    /// Participating-medium material. Density is specified per unit area and
    /// scaled up here to the internal units used by the absorption test.
    pub fn fog(color: Vec3, density: f32) -> Material {
        Self::with_model(color, Reflectance::Fog {
            density: density * 1000.0,
        })
    }

    /// Globally unique id for this instance within the process.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_light(&self) -> bool {
        matches!(self.model, Reflectance::Light { .. })
    }

    pub fn model(&self) -> &Reflectance {
        &self.model
    }

    /// Load a texture map into the diffuse channel. Failures are logged and
    /// leave the material textureless.
    pub fn load_diffuse_texture(&mut self, path: impl AsRef<Path>, texture_scale: f32) {
        match Texture::load(path.as_ref()) {
            Ok(texture) => {
                self.diffuse_map = Some(texture);
                self.texture_scale = texture_scale;
            }
            Err(err) => {
                log::error!("Failed to load {}: {}.", path.as_ref().display(), err);
            }
        }
    }

    /// True if the material can pass light through the surface.
    pub fn will_use_transmitted_light(&self) -> bool {
        matches!(
            self.model,
            Reflectance::Glass { .. } | Reflectance::Fog { .. }
        )
    }

    /// Whether tracing the indirect bounce along `incident_light` can
    /// contribute anything to this material's response.
    pub fn will_use_indirect_light(&self, incident_light: Vec3, normal: Vec3) -> bool {
        match &self.model {
            Reflectance::Light { .. } => false,
            Reflectance::Diffuse => incident_light.dot(normal) > DIFFUSE_CONTRIB_THRESHOLD,
            Reflectance::Metal { roughness } => {
                *roughness <= DIFFUSE_ROUGHNESS_THRESHOLD
                    || incident_light.dot(normal) > DIFFUSE_CONTRIB_THRESHOLD
            }
            _ => true,
        }
    }

    /// Reflection direction for the indirect bounce.
    pub fn reflection(
        &self,
        view: Vec3,
        normal: Vec3,
        is_internal: bool,
        rng: &mut SmallRng,
    ) -> Vec3 {
        use std::f32::consts::PI;
        match &self.model {
            Reflectance::Light { .. } => Vec3::ZERO,
            Reflectance::Diffuse => reflection_table().random_reflection(view, normal, PI, rng),
            Reflectance::Metal { roughness } => {
                reflection_table().random_reflection(view, normal, PI * roughness, rng)
            }
            Reflectance::Mirror => view.reflect(normal),
            Reflectance::Glass { .. } => {
                // TODO: fold the parsed index/reflectivity/frost parameters
                // into the refraction model; for now the nominal glass index
                // of 1.15 is hardcoded.
                let mut index = 1.0 / 1.15;
                if is_internal {
                    index = 1.0 / index;
                }
                view.refract(normal, index)
            }
            Reflectance::Liquid { .. } => {
                if rng.gen::<f32>() < 0.4 {
                    view.reflect(normal)
                } else {
                    view.refract(normal, 1.0 / 1.33)
                }
            }
            Reflectance::Ceramic { shininess } | Reflectance::Glow { shininess, .. } => {
                if rng.gen::<f32>() < 0.1 {
                    reflection_table().random_reflection(view, normal, 0.0, rng)
                } else {
                    reflection_table().random_reflection(view, normal, PI * (1.0 - shininess), rng)
                }
            }
            Reflectance::Fog { .. } => view,
        }
    }

    /// Color of reflected light at a surface point.
    pub fn sample(&self, s: &SurfaceSample, rng: &mut SmallRng) -> Vec3 {
        match &self.model {
            Reflectance::Light { emissive } => {
                if self.has_diffuse_map() {
                    self.sample_diffuse(s.texcoords)
                } else {
                    *emissive
                }
            }
            Reflectance::Diffuse => {
                self.sample_diffuse(s.texcoords)
                    * s.light_color
                    * s.normal.dot(s.light_dir).max(0.0)
            }
            Reflectance::Metal { roughness } => {
                let material_diffuse = self.sample_diffuse(s.texcoords);
                let diffuse_contrib =
                    material_diffuse * s.light_color * s.normal.dot(s.light_dir).max(0.0);
                let reflect_contrib = material_diffuse * s.light_color;
                diffuse_contrib * *roughness + reflect_contrib * (1.0 - roughness)
            }
            Reflectance::Mirror
            | Reflectance::Glass { .. }
            | Reflectance::Liquid { .. } => s.light_color * self.diffuse,
            Reflectance::Ceramic { .. } => self.sample_ceramic(s),
            Reflectance::Glow { glow, .. } => self.sample_ceramic(s) + *glow,
            Reflectance::Fog { density } => {
                // The first bounce computes a volumetric absorption
                // probability that grows with the squared distance the ray
                // traveled through the medium. Deeper bounces pass the
                // indirect light through untouched.
                if s.depth == 0 {
                    let dist = s.light_pos.distance(s.sample_pos);
                    let threshold = (dist * dist * density * 0.00005).max(0.0).clamp(0.0, 1.0);
                    if rng.gen::<f32>() < threshold {
                        return self.diffuse;
                    }
                }
                s.light_color
            }
        }
    }

    fn sample_ceramic(&self, s: &SurfaceSample) -> Vec3 {
        let half_vec = (-s.view_dir + s.light_dir).normalize_or_zero();
        let diffuse_contrib =
            self.sample_diffuse(s.texcoords) * s.light_color * s.normal.dot(s.light_dir).max(0.0);
        let dot_spec = half_vec.dot(s.normal).powi(50);
        s.light_color * dot_spec + diffuse_contrib * (1.0 - dot_spec)
    }

    fn has_diffuse_map(&self) -> bool {
        self.diffuse_map.as_ref().is_some_and(|map| !map.is_empty())
    }

    /// Diffuse color at the given texture coordinates: the map when one is
    /// loaded, the flat diffuse color otherwise.
    fn sample_diffuse(&self, texcoords: Vec2) -> Vec3 {
        let Some(map) = self.diffuse_map.as_ref().filter(|m| !m.is_empty()) else {
            return self.diffuse;
        };

        let x = (texcoords.x * self.texture_scale * map.width as f32 + 0.5) - 1.0;
        let y = (texcoords.y * self.texture_scale * map.height as f32 + 0.5) - 1.0;
        let x = (x as i64).rem_euclid(map.width as i64) as u32;
        let y = (y as i64).rem_euclid(map.height as i64) as u32;
        map.texel(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_material_ids_are_distinct() {
        let ids: std::collections::HashSet<u32> = (0..10_000)
            .map(|_| Material::diffuse(Vec3::ONE).id())
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_mirror_reflection_formula() {
        let mat = Material::mirror(Vec3::ONE);
        let mut rng = SmallRng::seed_from_u64(0);
        let v = Vec3::new(0.3, -0.8, 0.1).normalize();
        let n = Vec3::Y;
        let r = mat.reflection(v, n, false, &mut rng);
        let expected = v - n * 2.0 * v.dot(n);
        assert!((r - expected).length() < 1e-6);
    }

    #[test]
    fn test_light_never_bounces() {
        let mat = Material::light(Vec3::ONE);
        assert!(!mat.will_use_indirect_light(Vec3::Y, Vec3::Y));
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(mat.reflection(-Vec3::Y, Vec3::Y, false, &mut rng), Vec3::ZERO);
    }

    #[test]
    fn test_diffuse_indirect_gating() {
        let mat = Material::diffuse(Vec3::ONE);
        assert!(mat.will_use_indirect_light(Vec3::Y, Vec3::Y));
        assert!(!mat.will_use_indirect_light(-Vec3::Y, Vec3::Y));
        // Grazing bounces below the threshold are skipped too.
        assert!(!mat.will_use_indirect_light(Vec3::new(1.0, 0.0005, 0.0), Vec3::Y));
    }

    #[test]
    fn test_rough_metal_gates_like_diffuse() {
        let rough = Material::metal(Vec3::ONE, 0.99);
        assert!(!rough.will_use_indirect_light(-Vec3::Y, Vec3::Y));
        let polished = Material::metal(Vec3::ONE, 0.2);
        assert!(polished.will_use_indirect_light(-Vec3::Y, Vec3::Y));
    }

    #[test]
    fn test_diffuse_sample_scales_with_cosine() {
        let mat = Material::diffuse(Vec3::new(0.5, 0.5, 0.5));
        let mut rng = SmallRng::seed_from_u64(0);
        let mut s = SurfaceSample {
            depth: 0,
            sample_pos: Vec3::ZERO,
            view_pos: Vec3::new(0.0, 1.0, 0.0),
            view_dir: -Vec3::Y,
            light_pos: Vec3::Y,
            light_dir: Vec3::Y,
            light_color: Vec3::ONE,
            normal: Vec3::Y,
            texcoords: Vec2::ZERO,
            is_internal: false,
        };
        let head_on = mat.sample(&s, &mut rng);
        assert!((head_on - Vec3::splat(0.5)).length() < 1e-6);

        s.light_dir = Vec3::new(0.0, -1.0, 0.0);
        let below = mat.sample(&s, &mut rng);
        assert_eq!(below, Vec3::ZERO);
    }

    #[test]
    fn test_glow_adds_emission_over_ceramic() {
        let glow_color = Vec3::new(0.1, 0.2, 0.3);
        let base = Material::ceramic(Vec3::splat(0.5), 0.2);
        let glow = Material::glow(Vec3::splat(0.5), glow_color, 0.2);
        let mut rng = SmallRng::seed_from_u64(0);
        let s = SurfaceSample {
            depth: 0,
            sample_pos: Vec3::ZERO,
            view_pos: Vec3::new(0.0, 1.0, 0.0),
            view_dir: -Vec3::Y,
            light_pos: Vec3::Y,
            light_dir: Vec3::Y,
            light_color: Vec3::ONE,
            normal: Vec3::Y,
            texcoords: Vec2::ZERO,
            is_internal: false,
        };
        let diff = glow.sample(&s, &mut rng) - base.sample(&s, &mut rng);
        assert!((diff - glow_color).length() < 1e-6);
    }

    #[test]
    fn test_textured_sample_wraps() {
        let mut mat = Material::diffuse(Vec3::ZERO);
        mat.diffuse_map = Some(Texture {
            filename: String::new(),
            width: 2,
            height: 2,
            buffer: vec![
                1.0, 0.0, 0.0, /**/ 0.0, 1.0, 0.0, //
                0.0, 0.0, 1.0, /**/ 1.0, 1.0, 1.0,
            ],
        });
        mat.texture_scale = 1.0;

        // Any coordinate lands on some texel of the map, wrapped into range.
        for uv in [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.9, 0.9),
            Vec2::new(-0.3, 1.7),
            Vec2::new(5.25, -2.5),
        ] {
            let c = mat.sample_diffuse(uv);
            assert!(c.max_element() > 0.0);
        }
    }

    #[test]
    fn test_fog_passes_indirect_at_depth() {
        let mat = Material::fog(Vec3::ONE, 10.0);
        let mut rng = SmallRng::seed_from_u64(0);
        let s = SurfaceSample {
            depth: 3,
            sample_pos: Vec3::ZERO,
            view_pos: Vec3::ZERO,
            view_dir: Vec3::Z,
            light_pos: Vec3::new(0.0, 0.0, 100.0),
            light_dir: Vec3::Z,
            light_color: Vec3::new(0.25, 0.5, 0.75),
            normal: -Vec3::Z,
            texcoords: Vec2::ZERO,
            is_internal: false,
        };
        assert_eq!(mat.sample(&s, &mut rng), s.light_color);
    }
}
