//! Candidate aggregation: applicants for a job, each with their declared skills.
//!
//! The user -> skills fan-out is collapsed into one row per application with
//! `json_agg`. The skill joins are LEFT joins so applicants without skills still
//! appear; their all-NULL placeholder row is excluded by the `FILTER` clause and
//! the resulting NULL aggregate is replaced by an empty array.

/// Bind: `$1` = job id. Rows ordered by application id, skills by skill id.
pub const CANDIDATE_LIST_SQL: &str = r#"
SELECT
    a.application_id,
    us.user_id,
    us.email,
    us.full_name,
    us.phone,
    a.status,
    a.cv_path,
    COALESCE(
        json_agg(
            json_build_object('skill_id', sk.skill_id, 'name', sk.name)
            ORDER BY sk.skill_id
        ) FILTER (WHERE sk.skill_id IS NOT NULL),
        '[]'::json
    ) AS skills
FROM applications AS a
JOIN users AS us
    ON a.user_id = us.user_id
LEFT JOIN user_skills AS us_sk
    ON us.user_id = us_sk.user_id
LEFT JOIN skills AS sk
    ON us_sk.skill_id = sk.skill_id
WHERE a.job_id = $1
GROUP BY a.application_id, us.user_id
ORDER BY a.application_id ASC
"#;
