// CPU model detection for platform selection

use once_cell::sync::Lazy;

use crate::common::cpuid;

/// Family 6 display model numbers of the Xeon parts with PCIe event tables
pub mod models {
    pub const JAKETOWN: u32 = 0x2D;
    pub const IVYTOWN: u32 = 0x3E;
    pub const HASWELLX: u32 = 0x3F;
    pub const BDX_DE: u32 = 0x56;
    pub const BDX: u32 = 0x4F;
    pub const KNL: u32 = 0x57;
    pub const SKX: u32 = 0x55;
    pub const ICX: u32 = 0x6A;
    pub const SNOWRIDGE: u32 = 0x86;
    pub const SPR: u32 = 0x8F;
    pub const EMR: u32 = 0xCF;
    pub const SRF: u32 = 0xAF;
}

/// Decoded CPUID leaf 1 signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSignature {
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
}

impl CpuSignature {
    /// Decode the display family/model from CPUID.1:EAX
    pub fn from_eax(eax: u32) -> Self {
        let stepping = eax & 0xF;
        let model = (eax >> 4) & 0xF;
        let family = (eax >> 8) & 0xF;
        let extended_model = (eax >> 16) & 0xF;
        let extended_family = (eax >> 20) & 0xFF;

        let display_family = if family == 0xF {
            family + extended_family
        } else {
            family
        };

        let display_model = if family == 0x6 || family == 0xF {
            (extended_model << 4) + model
        } else {
            model
        };

        Self {
            family: display_family,
            model: display_model,
            stepping,
        }
    }

    pub fn detect() -> Self {
        let (eax, _ebx, _ecx, _edx) = cpuid::cpuid(1, 0);
        Self::from_eax(eax)
    }

    /// Human readable code name of the model, if it is a known Xeon part
    pub fn model_name(&self) -> Option<&'static str> {
        if self.family != 0x6 {
            return None;
        }

        let name = match self.model {
            models::JAKETOWN => "Jaketown",
            models::IVYTOWN => "Ivytown",
            models::HASWELLX => "Haswell-EP",
            models::BDX_DE => "Broadwell-DE",
            models::BDX => "Broadwell-EP",
            models::KNL => "Knights Landing",
            models::SKX if self.stepping >= 5 => "Cascade Lake-SP",
            models::SKX => "Skylake-SP",
            models::ICX => "Ice Lake-SP",
            models::SNOWRIDGE => "Snow Ridge",
            models::SPR => "Sapphire Rapids",
            models::EMR => "Emerald Rapids",
            models::SRF => "Sierra Forest",
            _ => return None,
        };
        Some(name)
    }
}

pub static CPU_SIGNATURE: Lazy<CpuSignature> = Lazy::new(|| {
    let signature = CpuSignature::detect();
    tracing::info!(
        "CPU: Family {:X}, Model {:X}, Stepping {:X}",
        signature.family,
        signature.model,
        signature.stepping
    );
    signature
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_skylake_sp() {
        // Xeon Gold 6148: CPUID.1:EAX = 0x00050654
        let sig = CpuSignature::from_eax(0x0005_0654);
        assert_eq!(sig.family, 6);
        assert_eq!(sig.model, models::SKX);
        assert_eq!(sig.stepping, 4);
        assert_eq!(sig.model_name(), Some("Skylake-SP"));
    }

    #[test]
    fn test_decode_sapphire_rapids() {
        let sig = CpuSignature::from_eax(0x0008_06F8);
        assert_eq!(sig.model, models::SPR);
        assert_eq!(sig.model_name(), Some("Sapphire Rapids"));
    }

    #[test]
    fn test_unknown_model_has_no_name() {
        // Client Skylake
        let sig = CpuSignature::from_eax(0x0005_06E3);
        assert_eq!(sig.model, 0x5E);
        assert_eq!(sig.model_name(), None);
    }
}
