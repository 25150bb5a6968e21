//! Built-in signature families loaded on engine initialization.

/// Default rule set, in scan priority order.
pub const DEFAULT_RULES: &str = r#"
rule Android_Banking_Trojan : android banking {
    meta:
        description = "Detects Android banking trojans"
        severity = "high"
        category = "malware"
    strings:
        $banking1 = "com.android.vending.BILLING"
        $banking2 = "overlay_service"
        $banking3 = "accessibility_service"
        $banking4 = "BIND_ACCESSIBILITY_SERVICE"
    condition:
        2 of ($banking*)
}

rule Fake_WhatsApp_APK : android impersonation {
    meta:
        description = "Detects fake WhatsApp applications"
        severity = "critical"
        category = "impersonation"
    strings:
        $whatsapp1 = "com.whatsapp"
        $fake1 = "whatsapp_plus"
        $fake2 = "gbwhatsapp"
        $fake3 = "whatsapp_gb"
    condition:
        $whatsapp1 and any of ($fake*)
}

rule Malicious_PDF_Exploit : document {
    meta:
        description = "Detects PDF documents carrying active content"
        severity = "medium"
        category = "exploit"
    strings:
        $pdf_header = "%PDF"
        $js_exploit = "/JavaScript"
        $embed_file = "/EmbeddedFile"
        $launch_action = "/Launch"
    condition:
        $pdf_header at 0 and ($js_exploit or $embed_file or $launch_action)
}

rule Android_Malware_APK : android {
    meta:
        description = "Generic Android malware detection"
        severity = "high"
        category = "malware"
    strings:
        $dex_header = "dex\n"
        $malware1 = "sendTextMessage"
        $malware2 = "abortBroadcast"
        $malware3 = "RECEIVE_SMS"
        $malware4 = "android.permission.SEND_SMS"
    condition:
        $dex_header at 0 and 2 of ($malware*)
}

rule Ransomware_Generic : ransomware {
    meta:
        description = "Detects ransom notes demanding payment for decryption"
        severity = "critical"
        category = "ransomware"
    strings:
        $ransom1 = "your files have been encrypted" nocase
        $ransom2 = "your personal files are encrypted" nocase
        $ransom3 = "decrypt your files" nocase
        $ransom4 = "bitcoin" nocase
        $ransom5 = "pay the ransom" nocase
        $ransom6 = "restore your files" nocase
    condition:
        2 of ($ransom*)
}

rule Suspicious_Executable : windows {
    meta:
        description = "PE executable importing process injection or download APIs"
        severity = "high"
        category = "suspicious"
    strings:
        $mz = { 4D 5A }
        $api1 = "VirtualAllocEx"
        $api2 = "WriteProcessMemory"
        $api3 = "CreateRemoteThread"
        $api4 = "URLDownloadToFile"
        $api5 = "WinExec"
        $api6 = "ShellExecute"
    condition:
        $mz at 0 and 2 of ($api*)
}

rule Phishing_Content : phishing {
    meta:
        description = "Detects credential phishing lures"
        severity = "medium"
        category = "phishing"
    strings:
        $phish1 = "urgent action required" nocase
        $phish2 = "enter your password" nocase
        $phish3 = "verify your account" nocase
        $phish4 = "will be suspended" nocase
        $phish5 = "confirm your identity" nocase
        $phish6 = "unusual sign-in activity" nocase
    condition:
        2 of ($phish*)
}
"#;

/// Names of the built-in rules, in catalog order.
pub const DEFAULT_RULE_NAMES: &[&str] = &[
    "Android_Banking_Trojan",
    "Fake_WhatsApp_APK",
    "Malicious_PDF_Exploit",
    "Android_Malware_APK",
    "Ransomware_Generic",
    "Suspicious_Executable",
    "Phishing_Content",
];
