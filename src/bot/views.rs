//! Static texts shown by the bot
//!
//! All texts use HTML parse mode.

use html_escape::encode_text;

/// Shown while an image is being analyzed
pub const ANALYZING_PLACEHOLDER: &str = "🔍 Analyzing your image, please wait...";

/// Shown while an image is being generated
pub const GENERATING_PLACEHOLDER: &str = "🎨 Generating your image, please wait...";

/// Welcome text for `/start`; administrators also see their commands
#[must_use]
pub fn welcome_message(first_name: &str, is_admin: bool) -> String {
    let mut text = format!(
        "🤖 Welcome to Advanced Gemini AI Bot, {}!\n\n\
         🌟 <b>Features:</b>\n\
         • 💬 Chat with Gemini AI\n\
         • 🖼️ Generate images with /generate\n\
         • 🔍 Analyze images (just send a photo)\n\
         • 📊 Get bot status with /status\n\n\
         Simply send me a message to start chatting!",
        encode_text(first_name)
    );

    if is_admin {
        text.push_str(
            "\n\n🔧 <b>Admin Commands:</b>\n\
             • /admin - Admin panel\n\
             • /stats - Detailed statistics",
        );
    }
    text
}

/// Text for `/help`
#[must_use]
pub const fn help_message() -> &'static str {
    "🤖 <b>Bot Commands:</b>\n\n\
     🔹 <code>/start</code> - Welcome message\n\
     🔹 <code>/help</code> - This help message\n\
     🔹 <code>/generate &lt;prompt&gt;</code> - Generate an image\n\
     🔹 <code>/status</code> - Bot status information\n\
     🔹 <code>/clear</code> - Clear conversation context\n\n\
     💬 <b>Chat Features:</b>\n\
     • Send any text message to chat with Gemini AI\n\
     • Send photos for detailed image analysis\n\
     • Context is maintained for better conversations\n\n\
     📸 <b>Image Analysis:</b>\n\
     • Send any image and I'll analyze it in detail\n\
     • Supports JPEG, PNG, and WebP formats\n\
     • Max file size: 20MB\n\n\
     🎨 <b>Image Generation:</b>\n\
     • Use <code>/generate</code> followed by your prompt\n\
     • Example: <code>/generate a sunset over mountains</code>"
}
