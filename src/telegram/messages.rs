// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fixed chat texts

pub const WELCOME_MESSAGE: &str = "🤖 **Welcome to the AI Image Classifier Bot!**\n\n\
🧠 Powered by ResNet50 neural network\n\
📸 Send me any photo and I'll identify what's in it!\n\n\
**Features:**\n\
• 🎯 AI object recognition\n\
• 📊 Confidence scores\n\
• 📏 Image analysis\n\
• ⚡ Fast processing\n\n\
Just send a photo to get started! 📸✨";

pub const HELP_MESSAGE: &str = "🆘 **How to use this bot:**\n\n\
1️⃣ Send any photo to this chat\n\
2️⃣ Wait for AI processing (usually 2-5 seconds)\n\
3️⃣ Get detailed analysis and classification!\n\n\
**Commands:**\n\
• /start - Welcome message\n\
• /help - This help message\n\n\
**Supported formats:** JPG, PNG, WebP, GIF\n\
**Recognition:** 1000+ object categories\n\n\
🚀 Just send a photo to begin!";

pub const SEND_PHOTO_PROMPT: &str = "📷 Please send a photo for AI analysis!";
