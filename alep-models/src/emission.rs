//! Emission of dispersal units by sporulating lesions, the first step of dispersal

use crate::allocation;
use alep_core::canopy::Canopy;
use alep_core::errors::AlepResult;
use alep_core::fungus::FloatValue;
use alep_core::models::{DispersalUnits, EmissionModel};
use alep_core::weather::WeatherWindow;
use serde::{Deserialize, Serialize};

/// Rain splash emission of septoria (Rapilly & Jolivet, 1976).
///
/// The dispersal units released by the canopy during a rain event are
///
/// ```text
/// 0.36 * 6.19e7 * intercept * fraction_spo * rain_intensity * domain_area
/// ```
///
/// where `intercept = 1 - exp(-k * LAI)` is the rain intercepted by the canopy and
/// `fraction_spo` the sporulating fraction of the leaf area. Every lesion contributes in
/// proportion to its sporulating surface, up to two thirds of its stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeptoriaRainEmission {
    /// Extinction coefficient of rain in a wheat canopy
    pub k_wheat: FloatValue,
    /// Fraction of the spore stock that can be released by a single rain event
    pub max_stock_fraction: FloatValue,
}

impl Default for SeptoriaRainEmission {
    fn default() -> Self {
        Self {
            k_wheat: 0.65,
            max_stock_fraction: 2.0 / 3.0,
        }
    }
}

/// Beer-Lambert interception by a leaf area (cm²) spread over `domain_area` (m²)
pub fn interception(k: FloatValue, leaf_area: FloatValue, domain_area: FloatValue) -> FloatValue {
    if domain_area <= 0.0 {
        return 0.0;
    }
    1.0 - (-k * leaf_area * 1e-4 / domain_area).exp()
}

/// Dispersal units released by rain splash from a sporulating fraction of the leaf area
pub fn rapilly_splash_dus(
    intercept: FloatValue,
    fraction_spo: FloatValue,
    rain_intensity: FloatValue,
    domain_area: FloatValue,
) -> FloatValue {
    0.36 * 6.19e7 * intercept * fraction_spo * rain_intensity * domain_area
}

impl EmissionModel for SeptoriaRainEmission {
    fn get_dispersal_units(
        &self,
        canopy: &mut Canopy,
        fungus_name: &str,
        label: &str,
        _weather: &WeatherWindow,
    ) -> AlepResult<DispersalUnits> {
        let total_area = canopy.total_leaf_area(label);
        let domain_area = canopy.domain_area;
        let intercept = interception(self.k_wheat, total_area, domain_area);

        let vids = canopy.vertices_with_label(label);
        let mut total_spo = 0.0;
        for vid in &vids {
            total_spo += canopy
                .node(*vid)?
                .lesions
                .iter()
                .filter(|l| l.fungus_name() == fungus_name)
                .map(|l| l.surface_spo())
                .sum::<FloatValue>();
        }
        let mut emissions = DispersalUnits::new();
        if total_spo <= 0.0 || total_area <= 0.0 {
            return Ok(emissions);
        }
        let fraction_spo = total_spo / total_area;

        for vid in vids {
            let leaf = canopy.node_mut(vid)?;
            let total_dus = rapilly_splash_dus(
                intercept,
                fraction_spo,
                leaf.microclimate.rain_intensity,
                domain_area,
            );
            let mut lesions = std::mem::take(&mut leaf.lesions);
            for lesion in lesions
                .iter_mut()
                .filter(|l| l.fungus_name() == fungus_name && l.is_sporulating())
            {
                if !lesion.is_stock_available(leaf) {
                    continue;
                }
                let nb_spores_by_du = lesion.fungus().parameters.nb_spores_by_du.max(1);
                let initial_stock = lesion.stock_spores();
                let stock_available = (initial_stock * self.max_stock_fraction).floor() as u64;
                let contribution = lesion.surface_spo() / total_spo;
                let nb_dus = ((contribution * total_dus).floor() as u64)
                    .min(stock_available / nb_spores_by_du);
                if nb_dus == 0 {
                    continue;
                }
                let nb_spores_emitted = (nb_dus * nb_spores_by_du) as FloatValue;
                lesion.reduce_stock(nb_spores_emitted);
                lesion.update_empty_surface(nb_spores_emitted, initial_stock);
                emissions
                    .entry(vid)
                    .or_default()
                    .extend(allocation::emitted(lesion.fungus(), nb_dus, lesion.position));
            }
            leaf.lesions = lesions;
        }
        Ok(emissions)
    }
}

/// Logistic release of spores by wind.
///
/// The fraction of the stock released is `e^(r*wind + b) / (1 + e^(r*wind + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindRelease {
    pub b: FloatValue,
    pub r: FloatValue,
}

impl WindRelease {
    pub fn rate(&self, wind_speed: FloatValue) -> FloatValue {
        let x = (self.r * wind_speed + self.b).exp();
        x / (1.0 + x)
    }
}

/// Emission of airborne spores from every lesion with a stock
fn wind_emission(
    release: WindRelease,
    canopy: &mut Canopy,
    fungus_name: &str,
    label: &str,
    weather: &WeatherWindow,
) -> AlepResult<DispersalUnits> {
    let mut emissions = DispersalUnits::new();
    for vid in canopy.vertices_with_label(label) {
        let leaf = canopy.node_mut(vid)?;
        let wind_speed = if leaf.microclimate.wind_speed > 0.0 {
            leaf.microclimate.wind_speed
        } else {
            weather.mean_wind_speed()
        };
        let rate = release.rate(wind_speed);
        for lesion in leaf
            .lesions
            .iter_mut()
            .filter(|l| l.fungus_name() == fungus_name && l.is_sporulating())
        {
            let stock = lesion.stock_spores();
            if stock <= 0.0 {
                continue;
            }
            let nb_spores_by_du = lesion.fungus().parameters.nb_spores_by_du.max(1);
            let nb_dus = (rate * stock / nb_spores_by_du as FloatValue).floor() as u64;
            if nb_dus == 0 {
                continue;
            }
            lesion.reduce_stock((nb_dus * nb_spores_by_du) as FloatValue);
            emissions
                .entry(vid)
                .or_default()
                .extend(allocation::emitted(lesion.fungus(), nb_dus, lesion.position));
        }
    }
    Ok(emissions)
}

/// Wind emission of powdery mildew (Willocquet & Clerjeau, 1998)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowderyMildewWindEmission {
    pub release: WindRelease,
}

impl Default for PowderyMildewWindEmission {
    fn default() -> Self {
        Self {
            release: WindRelease { b: -5.8, r: 0.41 },
        }
    }
}

impl EmissionModel for PowderyMildewWindEmission {
    fn get_dispersal_units(
        &self,
        canopy: &mut Canopy,
        fungus_name: &str,
        label: &str,
        weather: &WeatherWindow,
    ) -> AlepResult<DispersalUnits> {
        wind_emission(self.release, canopy, fungus_name, label, weather)
    }
}

/// Wind emission of brown rust urediniospores
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrownRustWindEmission {
    pub release: WindRelease,
}

impl Default for BrownRustWindEmission {
    fn default() -> Self {
        Self {
            release: WindRelease { b: -4.0, r: 0.5 },
        }
    }
}

impl EmissionModel for BrownRustWindEmission {
    fn get_dispersal_units(
        &self,
        canopy: &mut Canopy,
        fungus_name: &str,
        label: &str,
        weather: &WeatherWindow,
    ) -> AlepResult<DispersalUnits> {
        wind_emission(self.release, canopy, fungus_name, label, weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interception_grows_with_leaf_area() {
        assert_eq!(interception(0.65, 0.0, 1.0), 0.0);
        // LAI of 1
        assert_relative_eq!(interception(0.65, 1e4, 1.0), 1.0 - (-0.65f64).exp());
        assert!(interception(0.65, 5e4, 1.0) > interception(0.65, 1e4, 1.0));
        assert_eq!(interception(0.65, 1e4, 0.0), 0.0);
    }

    #[test]
    fn mildew_release_rate() {
        let release = PowderyMildewWindEmission::default().release;
        assert_relative_eq!(release.rate(0.0), (-5.8f64).exp() / (1.0 + (-5.8f64).exp()));
        assert!(release.rate(10.0) > release.rate(1.0));
        assert!(release.rate(100.0) <= 1.0);
    }
}
