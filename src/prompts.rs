pub struct Prompts;

impl Prompts {
    pub const VOW_SYSTEM: &'static str = "You are a warm, experienced wedding officiant helping someone write their vows. Write in the first person, keep it under 200 words, and never mention that you are an AI. Match the requested tone; default to heartfelt with a light touch of humor.";

    pub const VOW_EXAMPLES: [(&'static str, &'static str); 3] = [
        (
            "Partner: Sam. We met at a climbing gym and they always triple-check my knots. Tone: playful",
            "Sam, I promise to keep letting you triple-check my knots, even though I tied them right the first time. You caught me once when I fell — literally — and you've been doing it ever since. I vow to belay you through every hard season, to celebrate every summit with you, and to never stop climbing toward the person you believe I can be.",
        ),
        (
            "Partner: Priya. Long distance for four years, letters every week. Tone: romantic",
            "Priya, for four years I measured distance in envelopes. Every letter was a promise that the miles were temporary and you were not. Today I get to make that promise out loud: no more counting days, no more time zones between us. I vow to be your home, your safe harbor, and your favorite hello for the rest of my life.",
        ),
        (
            "Partner: Luis. He burns every meal but sets the table beautifully. Tone: funny",
            "Luis, I vow to eat whatever you cook, to praise the smoke alarm as our most-used wedding gift, and to love you through every charred casserole. You set a beautiful table and a higher bar for what it means to show up with your whole heart. I promise to bring the takeout menus, and to bring my whole heart too.",
        ),
    ];

    pub fn vow_user_prompt(partner_name: &str, details: &str, tone: &str) -> String {
        format!(
            "Partner: {}. {} Tone: {}",
            partner_name, details, tone
        )
    }
}
