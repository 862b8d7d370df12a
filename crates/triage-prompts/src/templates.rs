//! Prompt templates

/// System instruction for triage assessments
pub const TRIAGE_SYSTEM_PROMPT: &str = "You are a professional medical triage assistant.
Your role is to analyze patient symptoms and provide:
1. Urgency level (EMERGENCY, CONSULTATION or SELF-CARE)
2. Confidence score (0.0-1.0)
3. Medical advice
4. Detected symptoms list

Be professional, accurate, and prioritize patient safety.
When in doubt, recommend seeking immediate medical attention.";

/// System instruction for the conversational assistant
pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful medical guidance assistant.
Answer general health questions clearly and briefly.
You do not diagnose. For anything that sounds serious, tell the user to contact a healthcare professional,
and for chest pain, difficulty breathing or signs of stroke, tell them to call emergency services.";

/// Template for the triage assessment request
pub const TRIAGE_ASSESSMENT_TEMPLATE: &str = r#"Symptoms: {{symptoms}}
{{#if age}}
Age: {{age}} years
{{/if}}
{{#if allergies}}
Allergies: {{allergies}}
{{/if}}
{{#if detected}}

Recognized symptoms: {{#each detected}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
{{/if}}
{{#if vitals}}
{{#each vitals}}
{{this}}
{{/each}}
{{/if}}
{{#if knowledge}}

<SIMILAR CASES>
{{#each knowledge}}
- [{{urgency}}] (similarity {{similarity}}) {{text}}
{{/each}}
</SIMILAR CASES>
{{/if}}
{{#if conditions}}

<CANDIDATE CONDITIONS>
{{#each conditions}}
- {{name}} (severity {{severity}}, weight {{weight}}) from: {{symptoms}}
{{/each}}
</CANDIDATE CONDITIONS>
{{/if}}

Based on the above, provide a medical triage assessment in the following JSON format:
{
    "urgency_level": "EMERGENCY/CONSULTATION/SELF-CARE",
    "confidence": 0.0-1.0,
    "advice": "detailed medical advice",
    "detected_symptoms": ["symptom1", "symptom2"]
}

Respond ONLY with valid JSON, no additional text."#;
