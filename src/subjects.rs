#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub code: &'static str,
    pub name: &'static str,
    pub max_marks: u32,
    pub credits: u32,
}

const fn subject(code: &'static str, name: &'static str, max_marks: u32, credits: u32) -> Subject {
    Subject {
        code,
        name,
        max_marks,
        credits,
    }
}

/// Courses of the Mathematics & Computing and Environmental Engineering
/// fifth semester.
pub const SUBJECTS: &[Subject] = &[
    subject("MC-301", "MODERN ALGEBRA", 100, 4),
    subject("MC-302", "OPERATIONS RESEARCH", 100, 4),
    subject("MC-303", "FINANCIAL ENGINEERING", 100, 4),
    subject("MC-304", "INTERNET & NETWORK SECURITY", 100, 4),
    subject("MC-305", "DATABASE MANAGEMENT SYSTEM", 100, 4),
    subject("MC-306", "DATABASE MANAGEMENT SYSTEM LAB", 100, 2),
    subject("MC-307", "OPERATIONS RESEARCH LAB", 100, 2),
    subject("MC-308", "INTERNET & NETWORK SECURITY LAB", 100, 2),
    subject("MC-309", "MINOR PROJECT-I", 200, 4),
    subject("EN-301", "WATER SUPPLY & ENVIRONMENTAL SANITATION", 100, 4),
    subject("EN-302", "HEAVY METAL REMOVALS", 100, 4),
    subject("EN-303", "GEOTECHNICAL ENGINEERING", 100, 4),
    subject("EN-304", "ENVIRONMENTAL HYDRAULICS", 100, 4),
    subject("EN-305", "INSTRUMENTATION", 100, 4),
    subject("EN-306", "ENVIRONMENTAL HYDRAULICS LAB", 100, 2),
    subject("EN-307", "GEOTECHNICAL ENGINEERING LAB", 100, 2),
    subject("EN-308", "INSTRUMENTATION LAB", 100, 2),
    subject("EN-309", "MINOR PROJECT-I /SURVEYING CAMP EVALUATION", 200, 4),
];

pub fn lookup_subject(code: &str) -> Option<&'static Subject> {
    let code = code.trim();
    SUBJECTS
        .iter()
        .find(|subject| subject.code.eq_ignore_ascii_case(code))
}
