//! MToon toon-shading parameters as declared by `VRMC_materials_mtoon`.

use crate::document::TextureInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutlineWidthMode {
    #[default]
    None,
    WorldCoordinates,
    ScreenCoordinates,
}

impl OutlineWidthMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(OutlineWidthMode::None),
            "worldCoordinates" => Some(OutlineWidthMode::WorldCoordinates),
            "screenCoordinates" => Some(OutlineWidthMode::ScreenCoordinates),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutlineWidthMode::None => "none",
            OutlineWidthMode::WorldCoordinates => "worldCoordinates",
            OutlineWidthMode::ScreenCoordinates => "screenCoordinates",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MToon {
    pub spec_version: String,
    pub transparent_with_z_write: bool,
    pub render_queue_offset_number: i32,
    pub shade_color_factor: [f32; 3],
    pub shade_multiply_texture: Option<TextureInfo>,
    pub shading_shift_factor: f32,
    pub shading_shift_texture: Option<TextureInfo>,
    pub shading_shift_texture_scale: f32,
    pub shading_toony_factor: f32,
    pub gi_equalization_factor: f32,
    pub matcap_factor: [f32; 3],
    pub matcap_texture: Option<TextureInfo>,
    pub parametric_rim_color_factor: [f32; 3],
    pub rim_multiply_texture: Option<TextureInfo>,
    pub rim_lighting_mix_factor: f32,
    pub parametric_rim_fresnel_power_factor: f32,
    pub parametric_rim_lift_factor: f32,
    pub outline_width_mode: OutlineWidthMode,
    pub outline_width_factor: f32,
    pub outline_width_multiply_texture: Option<TextureInfo>,
    pub outline_color_factor: [f32; 3],
    pub outline_lighting_mix_factor: f32,
    pub uv_animation_mask_texture: Option<TextureInfo>,
    pub uv_animation_scroll_x_speed_factor: f32,
    pub uv_animation_scroll_y_speed_factor: f32,
    pub uv_animation_rotation_speed_factor: f32,
}

impl Default for MToon {
    fn default() -> Self {
        Self {
            spec_version: "1.0".to_string(),
            transparent_with_z_write: false,
            render_queue_offset_number: 0,
            shade_color_factor: [0.0; 3],
            shade_multiply_texture: None,
            shading_shift_factor: 0.0,
            shading_shift_texture: None,
            shading_shift_texture_scale: 1.0,
            shading_toony_factor: 0.9,
            gi_equalization_factor: 0.9,
            matcap_factor: [1.0; 3],
            matcap_texture: None,
            parametric_rim_color_factor: [0.0; 3],
            rim_multiply_texture: None,
            rim_lighting_mix_factor: 1.0,
            parametric_rim_fresnel_power_factor: 5.0,
            parametric_rim_lift_factor: 0.0,
            outline_width_mode: OutlineWidthMode::None,
            outline_width_factor: 0.0,
            outline_width_multiply_texture: None,
            outline_color_factor: [0.0; 3],
            outline_lighting_mix_factor: 1.0,
            uv_animation_mask_texture: None,
            uv_animation_scroll_x_speed_factor: 0.0,
            uv_animation_scroll_y_speed_factor: 0.0,
            uv_animation_rotation_speed_factor: 0.0,
        }
    }
}

// ─── Declared ranges ──────────────────────────────────────────────────────────

/// A factor whose value lies outside its declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    pub field: &'static str,
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

const RENDER_QUEUE_OFFSET_RANGE: (i32, i32) = (-9, 9);

impl MToon {
    fn ranged_factors(&self) -> [(&'static str, f32, f32, f32); 7] {
        [
            ("shadingToonyFactor", self.shading_toony_factor, 0.0, 1.0),
            ("shadingShiftFactor", self.shading_shift_factor, -1.0, 1.0),
            ("giEqualizationFactor", self.gi_equalization_factor, 0.0, 1.0),
            ("rimLightingMixFactor", self.rim_lighting_mix_factor, 0.0, 1.0),
            (
                "parametricRimFresnelPowerFactor",
                self.parametric_rim_fresnel_power_factor,
                0.0,
                f32::INFINITY,
            ),
            ("outlineWidthFactor", self.outline_width_factor, 0.0, f32::INFINITY),
            (
                "outlineLightingMixFactor",
                self.outline_lighting_mix_factor,
                0.0,
                1.0,
            ),
        ]
    }

    pub fn range_violations(&self) -> Vec<RangeViolation> {
        let mut violations: Vec<RangeViolation> = self
            .ranged_factors()
            .into_iter()
            .filter(|(_, value, min, max)| value < min || value > max)
            .map(|(field, value, min, max)| RangeViolation {
                field,
                value,
                min,
                max,
            })
            .collect();

        let (min, max) = RENDER_QUEUE_OFFSET_RANGE;
        if !(min..=max).contains(&self.render_queue_offset_number) {
            violations.push(RangeViolation {
                field: "renderQueueOffsetNumber",
                value: self.render_queue_offset_number as f32,
                min: min as f32,
                max: max as f32,
            });
        }
        violations
    }

    /// Copy with every ranged factor clamped into its declared range.
    pub fn clamped(&self) -> MToon {
        let (queue_min, queue_max) = RENDER_QUEUE_OFFSET_RANGE;
        MToon {
            shading_toony_factor: self.shading_toony_factor.clamp(0.0, 1.0),
            shading_shift_factor: self.shading_shift_factor.clamp(-1.0, 1.0),
            gi_equalization_factor: self.gi_equalization_factor.clamp(0.0, 1.0),
            rim_lighting_mix_factor: self.rim_lighting_mix_factor.clamp(0.0, 1.0),
            parametric_rim_fresnel_power_factor: self.parametric_rim_fresnel_power_factor.max(0.0),
            outline_width_factor: self.outline_width_factor.max(0.0),
            outline_lighting_mix_factor: self.outline_lighting_mix_factor.clamp(0.0, 1.0),
            render_queue_offset_number: self
                .render_queue_offset_number
                .clamp(queue_min, queue_max),
            ..self.clone()
        }
    }

    pub fn texture_indices(&self) -> Vec<usize> {
        [
            &self.shade_multiply_texture,
            &self.shading_shift_texture,
            &self.matcap_texture,
            &self.rim_multiply_texture,
            &self.outline_width_multiply_texture,
            &self.uv_animation_mask_texture,
        ]
        .into_iter()
        .filter_map(|info| info.as_ref().map(|info| info.index))
        .collect()
    }

    pub fn textures_mut(&mut self) -> [&mut Option<TextureInfo>; 6] {
        [
            &mut self.shade_multiply_texture,
            &mut self.shading_shift_texture,
            &mut self.matcap_texture,
            &mut self.rim_multiply_texture,
            &mut self.outline_width_multiply_texture,
            &mut self.uv_animation_mask_texture,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_mtoon_when_checking_ranges_then_nothing_is_reported() {
        assert!(MToon::default().range_violations().is_empty());
    }

    #[test]
    fn given_out_of_range_factors_when_clamping_then_values_land_on_bounds() {
        let mtoon = MToon {
            shading_toony_factor: 1.5,
            outline_width_factor: -0.2,
            render_queue_offset_number: 12,
            ..MToon::default()
        };

        let fields: Vec<&str> = mtoon
            .range_violations()
            .iter()
            .map(|violation| violation.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "shadingToonyFactor",
                "outlineWidthFactor",
                "renderQueueOffsetNumber"
            ]
        );

        let clamped = mtoon.clamped();
        assert_eq!(clamped.shading_toony_factor, 1.0);
        assert_eq!(clamped.outline_width_factor, 0.0);
        assert_eq!(clamped.render_queue_offset_number, 9);
        assert!(clamped.range_violations().is_empty());
    }
}
