use std::collections::{BTreeMap, BTreeSet};

use crate::error::CoreError;
use crate::model::{ClassSection, Student};

pub const DEFAULT_SECTION_CAPACITY: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPolicy {
    pub capacity: usize,
    pub room_pool: Vec<String>,
    /// Hard cap on sections per grade level. `None` opens sections as needed.
    pub max_sections: Option<usize>,
}

impl Default for SectionPolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SECTION_CAPACITY,
            room_pool: Vec::new(),
            max_sections: None,
        }
    }
}

/// `0 -> "A"`, `25 -> "Z"`, `26 -> "AA"`.
pub fn section_label(mut ordinal: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (ordinal % 26) as u8);
        if ordinal < 26 {
            break;
        }
        ordinal = ordinal / 26 - 1;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

pub fn label_ordinal(label: &str) -> Option<usize> {
    let label = label.trim();
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let mut n: usize = 0;
    for b in label.bytes() {
        n = n.checked_mul(26)?.checked_add((b - b'A') as usize + 1)?;
    }
    Some(n - 1)
}

fn admission_order(a: &&Student, b: &&Student) -> std::cmp::Ordering {
    a.admission_seq
        .cmp(&b.admission_seq)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sections for one grade level, keyed by label ordinal.
fn partition_grade(
    grade_level: &str,
    students: &[&Student],
    policy: &SectionPolicy,
) -> Result<BTreeMap<usize, Vec<String>>, CoreError> {
    let mut sections: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut to_place: Vec<&Student> = Vec::new();

    // Existing labels stick while their section has room.
    for s in students {
        let current = s.section.as_deref().and_then(label_ordinal);
        match current {
            Some(ord) if sections.get(&ord).map(|m| m.len()).unwrap_or(0) < policy.capacity => {
                sections.entry(ord).or_default().push(s.id.clone());
            }
            _ => to_place.push(s),
        }
    }

    for s in to_place {
        let open = sections
            .iter()
            .find(|(_, members)| members.len() < policy.capacity)
            .map(|(ord, _)| *ord);
        let ord = match open {
            Some(ord) => ord,
            None => {
                if let Some(max) = policy.max_sections {
                    if sections.len() >= max {
                        return Err(CoreError::CapacityExceeded {
                            grade_level: grade_level.to_string(),
                            capacity: policy.capacity,
                            max_sections: max,
                        });
                    }
                }
                let used: BTreeSet<usize> = sections.keys().copied().collect();
                (0..).find(|n| !used.contains(n)).unwrap_or(used.len())
            }
        };
        sections.entry(ord).or_default().push(s.id.clone());
    }

    Ok(sections)
}

/// Partitions the roster into capacity-bounded sections per grade level.
///
/// Students are visited in admission order. A student keeps its current
/// section while that section has room; everyone else is appended to the
/// first section with a free seat, or to a newly opened section with the
/// lowest unused label. Sections are never renamed or merged.
pub fn assign(roster: &[Student], policy: &SectionPolicy) -> Result<Vec<ClassSection>, CoreError> {
    if policy.capacity == 0 {
        return Err(CoreError::validation("section capacity must be at least 1"));
    }

    let mut by_grade: BTreeMap<&str, Vec<&Student>> = BTreeMap::new();
    for s in roster {
        by_grade.entry(s.grade_level.as_str()).or_default().push(s);
    }

    let mut out: Vec<ClassSection> = Vec::new();
    for (grade_level, mut students) in by_grade {
        students.sort_by(admission_order);
        let sections = partition_grade(grade_level, &students, policy)?;
        push_sections(&mut out, grade_level, sections, policy);
    }
    Ok(out)
}

fn push_sections(
    out: &mut Vec<ClassSection>,
    grade_level: &str,
    sections: BTreeMap<usize, Vec<String>>,
    policy: &SectionPolicy,
) {
    for (ord, student_ids) in sections {
        let label = section_label(ord);
        // Room is keyed on the label ordinal, not the output position.
        let room = if policy.room_pool.is_empty() {
            format!("{}-{}", grade_level, label)
        } else {
            policy.room_pool[ord % policy.room_pool.len()].clone()
        };
        out.push(ClassSection {
            grade_level: grade_level.to_string(),
            label,
            room,
            student_ids,
        });
    }
}

/// Groups the roster by the labels it already carries, without placing
/// anyone. Returns the sections and the ids of unassigned students.
pub fn current_sections(
    roster: &[Student],
    policy: &SectionPolicy,
) -> (Vec<ClassSection>, Vec<String>) {
    let mut by_grade: BTreeMap<&str, BTreeMap<usize, Vec<String>>> = BTreeMap::new();
    let mut unassigned: Vec<String> = Vec::new();
    let mut ordered: Vec<&Student> = roster.iter().collect();
    ordered.sort_by(admission_order);
    for s in ordered {
        match s.section.as_deref().and_then(label_ordinal) {
            Some(ord) => by_grade
                .entry(s.grade_level.as_str())
                .or_default()
                .entry(ord)
                .or_default()
                .push(s.id.clone()),
            None => unassigned.push(s.id.clone()),
        }
    }
    let mut out = Vec::new();
    for (grade_level, sections) in by_grade {
        push_sections(&mut out, grade_level, sections, policy);
    }
    (out, unassigned)
}

/// Where an admission lands: the new student's label and the grade level's
/// partition that produced it.
#[derive(Debug, Clone)]
pub struct Placement {
    pub label: String,
    pub sections: Vec<ClassSection>,
}

/// Places `new_student` into its grade level of `existing`.
pub fn assign_student_to_section(
    new_student: &Student,
    existing: &[Student],
    policy: &SectionPolicy,
) -> Result<Placement, CoreError> {
    let grade: Vec<Student> = existing
        .iter()
        .filter(|s| s.grade_level == new_student.grade_level && s.id != new_student.id)
        .cloned()
        .chain(std::iter::once(Student {
            section: None,
            ..new_student.clone()
        }))
        .collect();
    let sections = assign(&grade, policy)?;
    let label = sections
        .iter()
        .find(|sec| sec.student_ids.iter().any(|id| *id == new_student.id))
        .map(|sec| sec.label.clone())
        .ok_or(CoreError::NotFound("section"))?;
    Ok(Placement { label, sections })
}

/// `(student_id, label)` for every student the partition places.
pub fn labels_by_student(sections: &[ClassSection]) -> Vec<(String, String)> {
    sections
        .iter()
        .flat_map(|sec| {
            sec.student_ids
                .iter()
                .map(move |id| (id.clone(), sec.label.clone()))
        })
        .collect()
}
