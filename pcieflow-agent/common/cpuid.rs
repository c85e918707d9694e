#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// Vendor string from leaf 0 (EBX, EDX, ECX order)
pub fn vendor() -> String {
    let (_eax, ebx, ecx, edx) = cpuid(0, 0);
    let bytes: Vec<u8> = [ebx, edx, ecx]
        .iter()
        .flat_map(|reg| reg.to_le_bytes())
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn is_genuine_intel() -> bool {
    vendor() == "GenuineIntel"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_is_twelve_bytes() {
        if cfg!(target_arch = "x86_64") {
            assert_eq!(vendor().len(), 12);
        }
    }
}
