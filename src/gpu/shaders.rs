//! WGSL compute kernels for the gravity step
//!
//! Every step runs two passes over the full dispatch range:
//!
//! - `integrate_velocity`: acceleration from every other body, folded into the velocity
//! - `integrate_position`: position advanced by the new velocity
//!
//! The force pass exists in three flavours, one per [`TilingVariant`]. All
//! three visit the other bodies in ascending index order and share the
//! `pull` helper, so they produce the same sums. Work-group size and tile
//! length are baked in as constants when the source is generated.

use super::types::{KernelConfig, TilingVariant};

/// Bindings, uniforms and helpers shared by every kernel
pub const PRELUDE: &str = r#"
struct StepUniforms {
    body_count: u32,
    dt: f32,
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read_write> positions: array<f32>;
@group(0) @binding(1) var<storage, read_write> velocities: array<f32>;
@group(0) @binding(2) var<storage, read> neg_g_masses: array<f32>;
@group(0) @binding(3) var<uniform> params: StepUniforms;

fn load_position(i: u32) -> vec3<f32> {
    return vec3<f32>(positions[3u * i], positions[3u * i + 1u], positions[3u * i + 2u]);
}

fn load_velocity(i: u32) -> vec3<f32> {
    return vec3<f32>(velocities[3u * i], velocities[3u * i + 1u], velocities[3u * i + 2u]);
}

fn store_position(i: u32, p: vec3<f32>) {
    positions[3u * i] = p.x;
    positions[3u * i + 1u] = p.y;
    positions[3u * i + 2u] = p.z;
}

fn store_velocity(i: u32, v: vec3<f32>) {
    velocities[3u * i] = v.x;
    velocities[3u * i + 1u] = v.y;
    velocities[3u * i + 2u] = v.z;
}

// Acceleration on a body at p_i from a body at p_j; neg_g_mass = m_j * -G
fn pull(p_i: vec3<f32>, p_j: vec3<f32>, neg_g_mass: f32) -> vec3<f32> {
    let r = p_i - p_j;
    let r_mag = sqrt(dot(r, r));
    let a = neg_g_mass / (r_mag * r_mag);
    return (r / r_mag) * a;
}
"#;

/// One global read per pair
pub const FORCE_NAIVE: &str = r#"
@compute @workgroup_size(WORKGROUP_SIZE)
fn integrate_velocity(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    let n = params.body_count;
    if (i >= n) {
        return;
    }

    let p_i = load_position(i);
    var acc = vec3<f32>(0.0, 0.0, 0.0);
    for (var j = 0u; j < n; j++) {
        if (j == i) {
            continue;
        }
        acc += pull(p_i, load_position(j), neg_g_masses[j]);
    }

    store_velocity(i, load_velocity(i) + acc * params.dt);
}
"#;

/// Single tile in work-group memory; every lane helps stage, then all consume
pub const FORCE_SHARED_TILE: &str = r#"
var<workgroup> tile: array<vec4<f32>, TILE_BODIES>;

@compute @workgroup_size(WORKGROUP_SIZE)
fn integrate_velocity(
    @builtin(global_invocation_id) global_id: vec3<u32>,
    @builtin(local_invocation_index) lid: u32,
) {
    let i = global_id.x;
    let n = params.body_count;
    // Idle lanes still stage and hit every barrier; they just never store.
    let p_i = load_position(min(i, n - 1u));
    var acc = vec3<f32>(0.0, 0.0, 0.0);

    for (var base = 0u; base < n; base += TILE_BODIES) {
        let count = min(TILE_BODIES, n - base);
        for (var s = 0u; s < STAGE_ROUNDS; s++) {
            let k = s * WORKGROUP_SIZE + lid;
            if (k < count) {
                let j = base + k;
                tile[k] = vec4<f32>(load_position(j), neg_g_masses[j]);
            }
        }
        workgroupBarrier();

        for (var k = 0u; k < count; k++) {
            if (base + k != i) {
                let body = tile[k];
                acc += pull(p_i, body.xyz, body.w);
            }
        }
        workgroupBarrier();
    }

    if (i < n) {
        store_velocity(i, load_velocity(i) + acc * params.dt);
    }
}
"#;

/// Two tiles in work-group memory; batch b+1 is staged while batch b is consumed
pub const FORCE_ASYNC_COPY_TILE: &str = r#"
var<workgroup> tiles: array<array<vec4<f32>, TILE_BODIES>, 2>;

fn stage(slot: u32, base: u32, count: u32, lid: u32) {
    for (var s = 0u; s < STAGE_ROUNDS; s++) {
        let k = s * WORKGROUP_SIZE + lid;
        if (k < count) {
            let j = base + k;
            tiles[slot][k] = vec4<f32>(load_position(j), neg_g_masses[j]);
        }
    }
}

@compute @workgroup_size(WORKGROUP_SIZE)
fn integrate_velocity(
    @builtin(global_invocation_id) global_id: vec3<u32>,
    @builtin(local_invocation_index) lid: u32,
) {
    let i = global_id.x;
    let n = params.body_count;
    let p_i = load_position(min(i, n - 1u));
    var acc = vec3<f32>(0.0, 0.0, 0.0);

    stage(0u, 0u, min(TILE_BODIES, n), lid);
    workgroupBarrier();

    var slot = 0u;
    for (var base = 0u; base < n; base += TILE_BODIES) {
        let count = min(TILE_BODIES, n - base);
        let next = base + TILE_BODIES;
        // The other slot was last read before the previous barrier.
        if (next < n) {
            stage(1u - slot, next, min(TILE_BODIES, n - next), lid);
        }

        for (var k = 0u; k < count; k++) {
            if (base + k != i) {
                let body = tiles[slot][k];
                acc += pull(p_i, body.xyz, body.w);
            }
        }
        workgroupBarrier();
        slot = 1u - slot;
    }

    if (i < n) {
        store_velocity(i, load_velocity(i) + acc * params.dt);
    }
}
"#;

/// Position pass, shared by all variants
pub const UPDATE_POSITIONS: &str = r#"
@compute @workgroup_size(WORKGROUP_SIZE)
fn integrate_position(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    if (i >= params.body_count) {
        return;
    }
    store_position(i, load_position(i) + load_velocity(i) * params.dt);
}
"#;

/// Entry point of the force pass
pub const FORCE_ENTRY: &str = "integrate_velocity";

/// Entry point of the position pass
pub const POSITION_ENTRY: &str = "integrate_position";

/// Generated shader sources for one [`KernelConfig`]
pub struct KernelShaders {
    pub force: String,
    pub positions: String,
}

impl KernelShaders {
    pub fn new(config: &KernelConfig) -> Self {
        let body = match config.variant {
            TilingVariant::Naive => FORCE_NAIVE,
            TilingVariant::SharedTile => FORCE_SHARED_TILE,
            TilingVariant::AsyncCopyTile => FORCE_ASYNC_COPY_TILE,
        };
        Self {
            force: format!("{}\n{}\n{}", constants(config), PRELUDE, body),
            positions: format!("{}\n{}\n{}", constants(config), PRELUDE, UPDATE_POSITIONS),
        }
    }
}

fn constants(config: &KernelConfig) -> String {
    let tile = config.tile_bodies.max(1);
    format!(
        "const WORKGROUP_SIZE: u32 = {}u;\nconst TILE_BODIES: u32 = {}u;\nconst STAGE_ROUNDS: u32 = {}u;\n",
        config.workgroup_size,
        tile,
        tile.div_ceil(config.workgroup_size),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(variant: TilingVariant) -> KernelConfig {
        KernelConfig {
            variant,
            workgroup_size: 64,
            tile_bodies: if variant.is_tiled() { 256 } else { 0 },
            body_count: 100,
            dispatch_range: 128,
        }
    }

    #[test]
    fn test_constants_are_baked_in() {
        let shaders = KernelShaders::new(&config(TilingVariant::SharedTile));
        assert!(shaders.force.contains("const WORKGROUP_SIZE: u32 = 64u;"));
        assert!(shaders.force.contains("const TILE_BODIES: u32 = 256u;"));
        assert!(shaders.force.contains("const STAGE_ROUNDS: u32 = 4u;"));
        assert!(shaders.positions.contains("fn integrate_position"));
    }

    #[test]
    fn test_each_variant_has_its_own_force_body() {
        let naive = KernelShaders::new(&config(TilingVariant::Naive)).force;
        let shared = KernelShaders::new(&config(TilingVariant::SharedTile)).force;
        let async_copy = KernelShaders::new(&config(TilingVariant::AsyncCopyTile)).force;

        assert!(!naive.contains("var<workgroup>"));
        assert!(shared.contains("var<workgroup> tile:"));
        assert!(async_copy.contains("var<workgroup> tiles:"));
        for src in [&naive, &shared, &async_copy] {
            assert!(src.contains(&format!("fn {FORCE_ENTRY}")));
            assert!(src.contains("fn pull"));
        }
    }

    #[test]
    fn test_tiled_kernels_synchronise_per_batch() {
        let shared = KernelShaders::new(&config(TilingVariant::SharedTile)).force;
        assert_eq!(shared.matches("workgroupBarrier()").count(), 2);
        let async_copy = KernelShaders::new(&config(TilingVariant::AsyncCopyTile)).force;
        assert_eq!(async_copy.matches("workgroupBarrier()").count(), 2);
    }
}
